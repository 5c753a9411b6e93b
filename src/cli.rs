//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::calendar;
use crate::domain::config_validation::{
    resolve_gap_policy, resolve_session_time, resolve_tickers, resolve_trade_dates,
    validate_data_config, validate_signal_config, validate_simulation_config,
};
use crate::domain::error::TrendsimError;
use crate::domain::signal::SignalThresholds;
use crate::domain::simulator::{
    default_session_close, default_session_open, PortfolioSimulator, SimulationConfig,
    DEFAULT_INITIAL_CAPITAL, DEFAULT_LOOKAHEAD, DEFAULT_REVERSE_POINTS,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_REPORT: &str = "returns.csv";

#[derive(Parser, Debug)]
#[command(name = "trendsim", about = "Intraday trend-following trading simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay the configured sessions and write daily returns
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load a chart-API JSON payload into the price store
    Ingest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        date: Option<String>,
    },
    /// Show stored data range for ticker(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Simulate { config, .. }
            | Command::Validate { config }
            | Command::Ingest { config, .. }
            | Command::Info { config, .. } => config.as_path(),
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let adapter = match load_config(cli.command.config_path()) {
        Ok(a) => a,
        Err(code) => return code,
    };
    init_tracing(&adapter);

    match cli.command {
        Command::Simulate {
            config,
            output,
            ticker,
            date,
        } => run_simulate(
            &config,
            &adapter,
            output.as_deref(),
            ticker.as_deref(),
            date.as_deref(),
        ),
        Command::Validate { config } => run_validate(&config, &adapter),
        Command::Ingest {
            ticker,
            input,
            date,
            ..
        } => run_ingest(&adapter, &ticker, &input, date.as_deref()),
        Command::Info { ticker, .. } => run_info(&adapter, ticker.as_deref()),
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `[logging] filter`.
pub fn init_tracing(config: &dyn ConfigPort) {
    let default_filter = config
        .get_string("logging", "filter")
        .unwrap_or_else(|| "info".to_string());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TrendsimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn report_error(e: TrendsimError) -> ExitCode {
    eprintln!("error: {e}");
    (&e).into()
}

fn validate_all(adapter: &dyn ConfigPort) -> Result<(), TrendsimError> {
    validate_simulation_config(adapter)?;
    validate_signal_config(adapter)?;
    validate_data_config(adapter)?;
    Ok(())
}

pub fn build_simulation_config(adapter: &dyn ConfigPort) -> Result<SimulationConfig, TrendsimError> {
    let count = |key: &str, default: usize| {
        usize::try_from(adapter.get_int("simulation", key, default as i64)).unwrap_or(default)
    };

    Ok(SimulationConfig {
        tickers: resolve_tickers(adapter)?,
        trade_dates: resolve_trade_dates(adapter)?,
        initial_capital: Some(adapter.get_double(
            "simulation",
            "initial_capital",
            DEFAULT_INITIAL_CAPITAL,
        )),
        session_open: resolve_session_time(adapter, "session_open", default_session_open())?,
        session_close: resolve_session_time(adapter, "session_close", default_session_close())?,
        reverse_points: count("reverse_points", DEFAULT_REVERSE_POINTS),
        lookahead: count("lookahead", DEFAULT_LOOKAHEAD),
        gap_policy: resolve_gap_policy(adapter)?,
        thresholds: SignalThresholds {
            min_trend_gradient: adapter.get_double("signal", "min_trend_gradient", 0.1),
            max_start_width: adapter.get_double("signal", "max_start_width", 1.0),
        },
    })
}

/// Applies `--ticker` and `--date` overrides.
pub fn apply_overrides(
    mut config: SimulationConfig,
    ticker: Option<&str>,
    date: Option<&str>,
) -> Result<SimulationConfig, TrendsimError> {
    if let Some(t) = ticker {
        config.tickers = vec![t.trim().to_uppercase()];
    }
    if let Some(d) = date {
        let date = calendar::parse_date(d).map_err(|e| TrendsimError::ConfigInvalid {
            section: "cli".into(),
            key: "date".into(),
            reason: e.to_string(),
        })?;
        config.trade_dates = vec![date];
    }
    Ok(config)
}

pub fn open_data_port(adapter: &dyn ConfigPort) -> Result<Box<dyn PriceDataPort>, TrendsimError> {
    let source = adapter
        .get_string("data", "source")
        .unwrap_or_else(|| "sqlite".to_string());

    match source.trim().to_lowercase().as_str() {
        "csv" => {
            let dir = adapter
                .get_string("csv", "data_dir")
                .ok_or_else(|| TrendsimError::ConfigMissing {
                    section: "csv".into(),
                    key: "data_dir".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            Ok(Box::new(SqliteAdapter::from_config(adapter)?))
        }
        other => Err(TrendsimError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("data source '{other}' is not available in this build"),
        }),
    }
}

fn run_simulate(
    config_path: &Path,
    adapter: &FileConfigAdapter,
    output_path: Option<&Path>,
    ticker_override: Option<&str>,
    date_override: Option<&str>,
) -> ExitCode {
    // Stage 1: Validate config
    eprintln!("Loading config from {}", config_path.display());
    if let Err(e) = validate_all(adapter) {
        return report_error(e);
    }

    // Stage 2: Build SimulationConfig
    let sim_config = match build_simulation_config(adapter)
        .and_then(|c| apply_overrides(c, ticker_override, date_override))
    {
        Ok(c) => c,
        Err(e) => return report_error(e),
    };

    // Stage 3: Open data source
    let data_port = match open_data_port(adapter) {
        Ok(p) => p,
        Err(e) => return report_error(e),
    };

    eprintln!(
        "Running simulation: {} tickers, {} trade dates, {} to {}",
        sim_config.tickers.len(),
        sim_config.trade_dates.len(),
        sim_config.session_open.format("%H:%M"),
        sim_config.session_close.format("%H:%M"),
    );

    // Stage 4: Replay sessions
    let simulator = PortfolioSimulator::new(data_port.as_ref(), sim_config);
    let report = match simulator.run() {
        Ok(r) => r,
        Err(e) => return report_error(e),
    };

    // Stage 5: Print console summary to stderr
    let summaries = report.summaries();
    if !summaries.is_empty() {
        eprintln!("\n=== Per-Ticker Summary ===");
        for s in &summaries {
            eprintln!(
                "  {}:  {} days, {} trades, mean {:.3}%, compounded {:.3}%, best {:.3}%, worst {:.3}%{}",
                s.ticker,
                s.days,
                s.total_trades,
                s.mean_daily_return * 100.0,
                s.compounded_return * 100.0,
                s.best_day * 100.0,
                s.worst_day * 100.0,
                if s.bust_days > 0 {
                    format!(", {} bust", s.bust_days)
                } else {
                    String::new()
                },
            );
        }
    }

    // Stage 6: Write report
    let output = output_path
        .map(|p| p.display().to_string())
        .or_else(|| adapter.get_string("report", "output"))
        .unwrap_or_else(|| DEFAULT_REPORT.to_string());

    match CsvReportAdapter::new().write(&report.results, &output) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output);
            ExitCode::SUCCESS
        }
        Err(e) => report_error(e),
    }
}

fn run_validate(config_path: &Path, adapter: &FileConfigAdapter) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    if let Err(e) = validate_all(adapter) {
        return report_error(e);
    }

    let config = match build_simulation_config(adapter) {
        Ok(c) => c,
        Err(e) => return report_error(e),
    };

    eprintln!("\nUniverse:");
    eprintln!("  tickers: {}", config.tickers.join(", "));
    eprintln!("\nCalendar:");
    eprintln!("  trade dates: {}", config.trade_dates.len());
    if let (Some(first), Some(last)) = (config.trade_dates.first(), config.trade_dates.last()) {
        eprintln!("  range: {} to {}", first, last);
    }
    eprintln!(
        "  session: {} to {}",
        config.session_open.format("%H:%M"),
        config.session_close.format("%H:%M")
    );
    eprintln!("\nSignal:");
    eprintln!(
        "  window: {} points, lookahead: {}, gaps: {:?}",
        config.reverse_points, config.lookahead, config.gap_policy
    );
    eprintln!(
        "  min_trend_gradient: {}, max_start_width: {}",
        config.thresholds.min_trend_gradient, config.thresholds.max_start_width
    );

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn ingest_tag_date(adapter: &dyn ConfigPort, date: Option<&str>) -> Result<chrono::NaiveDateTime, TrendsimError> {
    let open = resolve_session_time(adapter, "session_open", default_session_open())?;
    let day = match date {
        Some(d) => calendar::parse_date(d).map_err(|e| TrendsimError::ConfigInvalid {
            section: "cli".into(),
            key: "date".into(),
            reason: e.to_string(),
        })?,
        None => resolve_trade_dates(adapter)?
            .first()
            .copied()
            .ok_or_else(|| TrendsimError::ConfigMissing {
                section: "simulation".into(),
                key: "trade_dates".into(),
            })?,
    };
    Ok(day.and_time(open))
}

fn run_ingest(
    adapter: &FileConfigAdapter,
    ticker: &str,
    input: &Path,
    date: Option<&str>,
) -> ExitCode {
    let ticker = ticker.trim().to_uppercase();
    let tag = match ingest_tag_date(adapter, date) {
        Ok(t) => t,
        Err(e) => return report_error(e),
    };

    eprintln!("Reading {} payload from {}", ticker, input.display());
    let observations =
        match crate::adapters::chart_feed_adapter::read_chart_file(input, &ticker, tag) {
            Ok(o) => o,
            Err(e) => return report_error(e),
        };
    eprintln!("  decoded {} rows", observations.len());

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let store = match SqliteAdapter::from_config(adapter) {
            Ok(s) => s,
            Err(e) => return report_error(e),
        };

        match store.upsert(observations) {
            Ok(plan) => {
                eprintln!(
                    "  inserted {}, already stored {}, incomplete {}",
                    plan.inserts.len(),
                    plan.already_stored,
                    plan.incomplete
                );
                ExitCode::SUCCESS
            }
            Err(e) => report_error(e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, observations);
        eprintln!("error: sqlite feature is required for ingest");
        ExitCode::from(1)
    }
}

fn run_info(adapter: &FileConfigAdapter, ticker: Option<&str>) -> ExitCode {
    let data_port = match open_data_port(adapter) {
        Ok(p) => p,
        Err(e) => return report_error(e),
    };

    let tickers = match ticker {
        Some(t) => vec![t.trim().to_uppercase()],
        None => match resolve_tickers(adapter).or_else(|_| data_port.list_tickers()) {
            Ok(t) => t,
            Err(e) => return report_error(e),
        },
    };

    for t in &tickers {
        match data_port.get_data_range(t) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} rows, {} to {}", t, count, first, last);
            }
            Ok(None) => {
                eprintln!("{}: no data found", t);
            }
            Err(e) => {
                eprintln!("error querying {}: {}", t, e);
            }
        }
    }
    ExitCode::SUCCESS
}
