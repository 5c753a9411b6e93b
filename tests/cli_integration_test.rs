//! CLI integration tests for config loading and command orchestration.
//!
//! Tests cover:
//! - Config parsing from INI files on disk (build_simulation_config)
//! - Validation failures and their exit codes
//! - CSV data source end to end through open_data_port
//! - Full simulate command writing a report
//! - Chart payload ingest into SQLite followed by a simulation

mod common;

use chrono::{NaiveDate, NaiveTime};
use common::*;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;
use trendsim::adapters::file_config_adapter::FileConfigAdapter;
use trendsim::cli::{self, Cli, Command};
use trendsim::domain::simulator::PortfolioSimulator;
use trendsim::domain::time_index::GapPolicy;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[data]
source = sqlite

[sqlite]
path = /tmp/trendsim-prices.db

[simulation]
tickers = NVDA, META, AAPL
start_date = 2024-05-27
end_date = 2024-05-31
holidays = 2024-05-27
initial_capital = 250000
session_open = 09:30
session_close = 16:00
reverse_points = 15
lookahead = 5
gap_policy = elapsed

[signal]
min_trend_gradient = 0.05
max_start_width = 2.0

[logging]
filter = warn
"#;

/// Writes `<dir>/<ticker>.csv` with one row per observation.
fn write_price_csv(dir: &Path, ticker: &str, rows: &[PriceObservation]) {
    let mut out = String::from("as_at,ticker,currency,high,low,open,close,volume\n");
    for o in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            o.timestamp.format("%Y-%m-%d %H:%M:%S"),
            o.ticker,
            o.currency,
            o.high,
            o.low,
            o.open,
            o.close,
            o.volume
        ));
    }
    std::fs::write(dir.join(format!("{ticker}.csv")), out).unwrap();
}

fn csv_ini(data_dir: &Path, extra: &str) -> String {
    format!(
        "[data]\nsource = csv\n\n[csv]\ndata_dir = {}\n\n[simulation]\ntickers = NVDA, META\ntrade_dates = 2024-05-28\nsession_close = 10:30\n{}",
        data_dir.display(),
        extra
    )
}

mod config_loading {
    use super::*;

    #[test]
    fn build_simulation_config_from_file() {
        let file = write_temp_ini(VALID_INI);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        let config = cli::build_simulation_config(&adapter).unwrap();

        assert_eq!(config.tickers, vec!["NVDA", "META", "AAPL"]);
        assert_eq!(config.trade_dates.len(), 4);
        assert_eq!(config.trade_dates[0], date("2024-05-28"));
        assert_eq!(config.trade_dates[3], date("2024-05-31"));
        assert_eq!(config.initial_capital, Some(250_000.0));
        assert_eq!(config.session_open, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(config.session_close, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
        assert_eq!(config.reverse_points, 15);
        assert_eq!(config.lookahead, 5);
        assert_eq!(config.gap_policy, GapPolicy::Elapsed);
        assert!((config.thresholds.min_trend_gradient - 0.05).abs() < f64::EPSILON);
        assert!((config.thresholds.max_start_width - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn explicit_trade_dates_win_over_range() {
        let ini = r#"
[simulation]
tickers = NVDA
trade_dates = 2024-05-30, 2024-05-28, 2024-05-30
start_date = 2024-01-01
end_date = 2024-12-31
"#;
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let config = cli::build_simulation_config(&adapter).unwrap();
        assert_eq!(
            config.trade_dates,
            vec![date("2024-05-28"), date("2024-05-30")]
        );
    }

    #[test]
    fn missing_tickers_is_config_missing() {
        let adapter =
            FileConfigAdapter::from_string("[simulation]\ntrade_dates = 2024-05-28\n").unwrap();
        let err = cli::build_simulation_config(&adapter).unwrap_err();
        assert!(matches!(err, TrendsimError::ConfigMissing { ref key, .. } if key == "tickers"));
        assert_eq!(ExitCode::from(&err), ExitCode::from(2));
    }

    #[test]
    fn weekend_only_range_is_rejected() {
        let ini = r#"
[simulation]
tickers = NVDA
start_date = 2024-06-01
end_date = 2024-06-02
"#;
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let err = cli::build_simulation_config(&adapter).unwrap_err();
        assert!(matches!(err, TrendsimError::ConfigInvalid { ref key, .. } if key == "start_date"));
    }

    #[test]
    fn unreadable_config_file_exits_with_config_code() {
        let code = cli::load_config(Path::new("/nonexistent/trendsim.ini")).err().unwrap();
        assert_eq!(code, ExitCode::from(2));
    }
}

mod validation {
    use super::*;

    fn validate(ini: &str) -> ExitCode {
        let file = write_temp_ini(ini);
        cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        })
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(validate(VALID_INI), ExitCode::SUCCESS);
    }

    #[test]
    fn inverted_session_fails() {
        let ini = VALID_INI.replace("session_close = 16:00", "session_close = 09:00");
        assert_eq!(validate(&ini), ExitCode::from(2));
    }

    #[test]
    fn bad_gap_policy_fails() {
        let ini = VALID_INI.replace("gap_policy = elapsed", "gap_policy = stretched");
        assert_eq!(validate(&ini), ExitCode::from(2));
    }

    #[test]
    fn unknown_data_source_fails() {
        let ini = VALID_INI.replace("source = sqlite", "source = parquet");
        assert_eq!(validate(&ini), ExitCode::from(2));
    }

    #[test]
    fn tiny_window_fails() {
        let ini = VALID_INI.replace("reverse_points = 15", "reverse_points = 1");
        assert_eq!(validate(&ini), ExitCode::from(2));
    }
}

mod csv_source {
    use super::*;

    #[test]
    fn simulation_over_csv_files() {
        let dir = TempDir::new().unwrap();
        write_price_csv(
            dir.path(),
            "NVDA",
            &rising_session("NVDA", "2024-05-28", 30, 1_000.0, 1.0),
        );
        write_price_csv(
            dir.path(),
            "META",
            &flat_session("META", "2024-05-28", 30, 470.0),
        );

        let adapter = FileConfigAdapter::from_string(&csv_ini(dir.path(), "")).unwrap();
        let config = cli::build_simulation_config(&adapter).unwrap();
        let port = cli::open_data_port(&adapter).unwrap();

        assert_eq!(port.list_tickers().unwrap(), vec!["META", "NVDA"]);
        let (first, last, count) = port.get_data_range("NVDA").unwrap().unwrap();
        assert_eq!(count, 30);
        assert_eq!(first, date("2024-05-28").and_hms_opt(9, 30, 0).unwrap());
        assert_eq!(last, date("2024-05-28").and_hms_opt(9, 59, 0).unwrap());

        let report = PortfolioSimulator::new(port.as_ref(), config).run().unwrap();
        assert_eq!(report.results.len(), 2);

        let nvda = &report.results[0];
        assert_eq!(nvda.ticker, "NVDA");
        assert_eq!(nvda.trade_count, 1);
        assert!((nvda.return_pct - (1_029.0 / 1_001.0 - 1.0)).abs() < 1e-12);

        let meta = &report.results[1];
        assert_eq!(meta.ticker, "META");
        assert_eq!(meta.trade_count, 0);
        assert_eq!(meta.return_pct, 0.0);
    }

    #[test]
    fn missing_ticker_file_yields_empty_session() {
        let dir = TempDir::new().unwrap();
        write_price_csv(
            dir.path(),
            "NVDA",
            &rising_session("NVDA", "2024-05-28", 30, 1_000.0, 1.0),
        );

        let adapter = FileConfigAdapter::from_string(&csv_ini(dir.path(), "")).unwrap();
        let config = cli::build_simulation_config(&adapter).unwrap();
        let port = cli::open_data_port(&adapter).unwrap();
        let report = PortfolioSimulator::new(port.as_ref(), config).run().unwrap();

        let meta = report.results.iter().find(|r| r.ticker == "META").unwrap();
        assert_eq!(meta.trade_count, 0);
        assert_eq!(meta.return_pct, 0.0);
    }

    #[test]
    fn simulate_command_writes_report() {
        let dir = TempDir::new().unwrap();
        write_price_csv(
            dir.path(),
            "NVDA",
            &rising_session("NVDA", "2024-05-28", 30, 1_000.0, 1.0),
        );
        write_price_csv(
            dir.path(),
            "META",
            &flat_session("META", "2024-05-28", 30, 470.0),
        );
        let ini = write_temp_ini(&csv_ini(dir.path(), ""));
        let output = dir.path().join("out.csv");

        let code = cli::run(Cli {
            command: Command::Simulate {
                config: ini.path().to_path_buf(),
                output: Some(output.clone()),
                ticker: None,
                date: None,
            },
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Date,Ticker,Return,TradeCount");
        assert!(lines[1].starts_with("2024-05-28,NVDA,"));
        assert!(lines[1].ends_with(",1"));
        assert_eq!(lines[2], "2024-05-28,META,0.0,0");
    }

    #[test]
    fn ticker_override_narrows_the_run() {
        let dir = TempDir::new().unwrap();
        write_price_csv(
            dir.path(),
            "NVDA",
            &rising_session("NVDA", "2024-05-28", 30, 1_000.0, 1.0),
        );
        let output = dir.path().join("returns.csv");
        let ini = write_temp_ini(&csv_ini(
            dir.path(),
            &format!("\n[report]\noutput = {}\n", output.display()),
        ));

        let code = cli::run(Cli {
            command: Command::Simulate {
                config: ini.path().to_path_buf(),
                output: None,
                ticker: Some("nvda".into()),
                date: Some("2024-05-28".into()),
            },
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(!text.contains("META"));
    }

    #[test]
    fn zero_capital_is_rejected_before_running() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&csv_ini(dir.path(), "initial_capital = 0\n"));
        let code = cli::run(Cli {
            command: Command::Simulate {
                config: ini.path().to_path_buf(),
                output: Some(dir.path().join("never.csv")),
                ticker: None,
                date: None,
            },
        });
        assert_eq!(code, ExitCode::from(2));
        assert!(!dir.path().join("never.csv").exists());
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_store {
    use super::*;

    // 2024-05-28 13:30:00 UTC, 09:30 in New York
    const OPEN_UTC: i64 = 1_716_903_000;

    fn chart_payload(minutes: i64, start: f64, step: f64) -> String {
        let timestamps: Vec<i64> = (0..minutes).map(|m| OPEN_UTC + 60 * m).collect();
        let mids: Vec<f64> = (0..minutes).map(|m| start + step * m as f64).collect();
        serde_json::json!({
            "chart": {
                "result": [{
                    "meta": {
                        "currency": "USD",
                        "symbol": "NVDA",
                        "instrumentType": "EQUITY",
                        "exchangeName": "NMS",
                        "exchangeTimezoneName": "America/New_York",
                        "gmtoffset": -14400
                    },
                    "timestamp": timestamps,
                    "indicators": {"quote": [{
                        "high": mids.iter().map(|m| m + 0.5).collect::<Vec<_>>(),
                        "low": mids.iter().map(|m| m - 0.5).collect::<Vec<_>>(),
                        "open": mids,
                        "close": mids,
                        "volume": vec![1_000; minutes as usize]
                    }]}
                }],
                "error": null
            }
        })
        .to_string()
    }

    fn sqlite_ini(dir: &Path) -> String {
        format!(
            "[data]\nsource = sqlite\n\n[sqlite]\npath = {}\n\n[simulation]\ntickers = NVDA\ntrade_dates = 2024-05-28\nsession_close = 10:30\n\n[report]\noutput = {}\n",
            dir.join("prices.db").display(),
            dir.join("returns.csv").display()
        )
    }

    #[test]
    fn ingest_then_simulate() {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("nvda.json");
        std::fs::write(&payload, chart_payload(30, 1_000.0, 1.0)).unwrap();
        let ini = write_temp_ini(&sqlite_ini(dir.path()));

        let ingest = || {
            cli::run(Cli {
                command: Command::Ingest {
                    config: ini.path().to_path_buf(),
                    ticker: "nvda".into(),
                    input: payload.clone(),
                    date: None,
                },
            })
        };
        assert_eq!(ingest(), ExitCode::SUCCESS);
        // second load finds every row already stored
        assert_eq!(ingest(), ExitCode::SUCCESS);

        let adapter = FileConfigAdapter::from_file(ini.path()).unwrap();
        let port = cli::open_data_port(&adapter).unwrap();
        let (first, last, count) = port.get_data_range("NVDA").unwrap().unwrap();
        assert_eq!(count, 30);
        assert_eq!(
            first,
            NaiveDate::from_ymd_opt(2024, 5, 28)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );
        assert_eq!(last, date("2024-05-28").and_hms_opt(9, 59, 0).unwrap());
        drop(port);

        let code = cli::run(Cli {
            command: Command::Simulate {
                config: ini.path().to_path_buf(),
                output: None,
                ticker: None,
                date: None,
            },
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let text = std::fs::read_to_string(dir.path().join("returns.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("2024-05-28,NVDA,"));
        assert!(lines[1].ends_with(",1"));
    }

    #[test]
    fn info_reports_stored_range() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&sqlite_ini(dir.path()));
        let code = cli::run(Cli {
            command: Command::Info {
                config: ini.path().to_path_buf(),
                ticker: Some("NVDA".into()),
            },
        });
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn malformed_payload_is_feed_error() {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("bad.json");
        std::fs::write(&payload, "{not json").unwrap();
        let ini = write_temp_ini(&sqlite_ini(dir.path()));

        let code = cli::run(Cli {
            command: Command::Ingest {
                config: ini.path().to_path_buf(),
                ticker: "NVDA".into(),
                input: payload,
                date: Some("2024-05-28".into()),
            },
        });
        assert_eq!(code, ExitCode::from(4));
    }
}
