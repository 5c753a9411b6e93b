//! Configuration validation.
//!
//! Validates all config fields before a simulation runs. The `resolve_*`
//! helpers are shared with the CLI, which builds the run configuration from
//! the same values.

use crate::domain::calendar::{self, CalendarError};
use crate::domain::error::TrendsimError;
use crate::domain::time_index::GapPolicy;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveTime};

const SIMULATION: &str = "simulation";
const SIGNAL: &str = "signal";
const DATA: &str = "data";

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TrendsimError {
    TrendsimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> TrendsimError {
    TrendsimError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn non_blank(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    resolve_tickers(config)?;
    resolve_trade_dates(config)?;
    validate_initial_capital(config)?;
    validate_session(config)?;
    validate_window(config)?;
    resolve_gap_policy(config)?;
    Ok(())
}

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let gradient = config.get_double(SIGNAL, "min_trend_gradient", 0.1);
    if !gradient.is_finite() {
        return Err(invalid(SIGNAL, "min_trend_gradient", "min_trend_gradient must be finite"));
    }
    let width = config.get_double(SIGNAL, "max_start_width", 1.0);
    if !width.is_finite() || width <= 0.0 {
        return Err(invalid(SIGNAL, "max_start_width", "max_start_width must be positive"));
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let source = config
        .get_string(DATA, "source")
        .unwrap_or_else(|| "sqlite".to_string());
    match source.trim().to_lowercase().as_str() {
        "sqlite" => match non_blank(config, "sqlite", "path") {
            Some(_) => Ok(()),
            None => Err(missing("sqlite", "path")),
        },
        "csv" => match non_blank(config, "csv", "data_dir") {
            Some(_) => Ok(()),
            None => Err(missing("csv", "data_dir")),
        },
        other => Err(invalid(
            DATA,
            "source",
            format!("unknown data source '{other}' (expected sqlite or csv)"),
        )),
    }
}

pub fn resolve_tickers(config: &dyn ConfigPort) -> Result<Vec<String>, TrendsimError> {
    let raw = non_blank(config, SIMULATION, "tickers").ok_or_else(|| missing(SIMULATION, "tickers"))?;
    parse_tickers(&raw).map_err(|e| invalid(SIMULATION, "tickers", e.to_string()))
}

fn calendar_error(key: &str, err: CalendarError) -> TrendsimError {
    invalid(SIMULATION, key, err.to_string())
}

/// Trade dates from `trade_dates`, or from `start_date..=end_date` minus
/// weekends and `holidays`. Sorted and de-duplicated.
pub fn resolve_trade_dates(config: &dyn ConfigPort) -> Result<Vec<NaiveDate>, TrendsimError> {
    if let Some(list) = non_blank(config, SIMULATION, "trade_dates") {
        let dates = calendar::parse_date_list(&list).map_err(|e| calendar_error("trade_dates", e))?;
        if dates.is_empty() {
            return Err(missing(SIMULATION, "trade_dates"));
        }
        return Ok(calendar::normalise(&dates));
    }

    let start = non_blank(config, SIMULATION, "start_date")
        .ok_or_else(|| missing(SIMULATION, "start_date"))?;
    let end = non_blank(config, SIMULATION, "end_date")
        .ok_or_else(|| missing(SIMULATION, "end_date"))?;
    let start = calendar::parse_date(&start).map_err(|e| calendar_error("start_date", e))?;
    let end = calendar::parse_date(&end).map_err(|e| calendar_error("end_date", e))?;

    let holidays = match non_blank(config, SIMULATION, "holidays") {
        Some(list) => calendar::parse_date_list(&list).map_err(|e| calendar_error("holidays", e))?,
        None => Vec::new(),
    };

    let days = calendar::trading_days(start, end, &holidays)
        .map_err(|e| calendar_error("start_date", e))?;
    if days.is_empty() {
        return Err(invalid(
            SIMULATION,
            "start_date",
            "date range contains no trading days",
        ));
    }
    Ok(days)
}

pub fn parse_session_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

pub fn resolve_session_time(
    config: &dyn ConfigPort,
    key: &str,
    default: NaiveTime,
) -> Result<NaiveTime, TrendsimError> {
    match non_blank(config, SIMULATION, key) {
        None => Ok(default),
        Some(s) => parse_session_time(&s)
            .ok_or_else(|| invalid(SIMULATION, key, format!("invalid time '{s}', expected HH:MM"))),
    }
}

pub fn resolve_gap_policy(config: &dyn ConfigPort) -> Result<GapPolicy, TrendsimError> {
    match non_blank(config, SIMULATION, "gap_policy") {
        None => Ok(GapPolicy::default()),
        Some(s) => s.parse().map_err(|reason: String| invalid(SIMULATION, "gap_policy", reason)),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let value = config.get_double(SIMULATION, "initial_capital", 1_000_000.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            SIMULATION,
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_session(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let open = resolve_session_time(
        config,
        "session_open",
        crate::domain::simulator::default_session_open(),
    )?;
    let close = resolve_session_time(
        config,
        "session_close",
        crate::domain::simulator::default_session_close(),
    )?;
    if open >= close {
        return Err(invalid(
            SIMULATION,
            "session_open",
            "session_open must be before session_close",
        ));
    }
    Ok(())
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let reverse_points = config.get_int(SIMULATION, "reverse_points", 10);
    if reverse_points < 2 {
        return Err(invalid(
            SIMULATION,
            "reverse_points",
            "reverse_points must be at least 2",
        ));
    }
    let lookahead = config.get_int(SIMULATION, "lookahead", 10);
    if lookahead < 0 {
        return Err(invalid(SIMULATION, "lookahead", "lookahead must be non-negative"));
    }
    Ok(())
}
