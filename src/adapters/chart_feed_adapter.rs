//! Decoder for chart-API JSON payloads.
//!
//! The payload normally looks like
//! `{"chart": {"result": [{"meta": ..., "timestamp": [...], "indicators": {"quote": [{...}]}}]}}`
//! but some responses carry `result` as a bare object, and error responses
//! use a `finance` envelope instead of `chart`.

use crate::domain::error::TrendsimError;
use crate::domain::observation::{InstrumentMeta, PriceObservation};
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    instrument_type: Option<String>,
    #[serde(default)]
    exchange_name: Option<String>,
    #[serde(default)]
    exchange_timezone_name: Option<String>,
    #[serde(default, rename = "gmtoffset")]
    gmt_offset: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

/// Finds the `result` node, trying each known envelope shape in turn.
/// `Some(Value::Null)` means the envelope was found but carried no result.
fn locate_result(root: &Value) -> Option<&Value> {
    if let Some(result) = root.get("chart").and_then(|c| c.get("result")) {
        return match result {
            Value::Array(items) => Some(items.first().unwrap_or(&Value::Null)),
            other => Some(other),
        };
    }
    let result = root.get("finance").and_then(|f| f.get("result"))?;
    info!("'chart' envelope missing, using 'finance'");
    Some(result)
}

fn column(values: &[Option<f64>], i: usize) -> f64 {
    values.get(i).copied().flatten().unwrap_or(f64::NAN)
}

/// Decodes one payload for `ticker`. `requested_start` tags the placeholder
/// row returned when the payload carries no data.
pub fn decode_chart(
    ticker: &str,
    payload: &str,
    requested_start: NaiveDateTime,
) -> Result<Vec<PriceObservation>, TrendsimError> {
    let root: Value = serde_json::from_str(payload).map_err(|e| TrendsimError::Feed {
        ticker: ticker.to_string(),
        reason: format!("invalid JSON: {e}"),
    })?;

    let Some(result) = locate_result(&root) else {
        error!(ticker, %requested_start, "no known envelope in chart payload");
        return Ok(Vec::new());
    };

    let placeholder = || {
        error!(
            severity = "critical",
            ticker,
            %requested_start,
            "no data in chart payload, returning placeholder"
        );
        vec![PriceObservation::placeholder(requested_start)]
    };

    if result.is_null() {
        return Ok(placeholder());
    }
    let parsed = match ChartResult::deserialize(result) {
        Ok(ChartResult {
            meta: Some(meta),
            timestamp: Some(timestamps),
            indicators: Some(indicators),
        }) => (meta, timestamps, indicators),
        _ => return Ok(placeholder()),
    };
    let (meta, timestamps, indicators) = parsed;

    let quote = indicators.quote.into_iter().next().unwrap_or_default();
    let lengths = [
        quote.low.len(),
        quote.high.len(),
        quote.open.len(),
        quote.close.len(),
        quote.volume.len(),
    ];
    if lengths.iter().any(|&n| n != lengths[0]) || timestamps.len() != lengths[0] {
        error!(ticker, ?lengths, timestamps = timestamps.len(), "quote columns differ in length");
        return Err(TrendsimError::Feed {
            ticker: ticker.to_string(),
            reason: "quote columns have different lengths".into(),
        });
    }

    let gmt_offset = meta.gmt_offset.unwrap_or(0);
    let instrument = InstrumentMeta {
        instrument_type: meta.instrument_type.unwrap_or_default(),
        exchange_name: meta.exchange_name.unwrap_or_default(),
        time_zone: meta.exchange_timezone_name.unwrap_or_default(),
        gmt_offset,
    };
    let symbol = meta.symbol.unwrap_or_else(|| ticker.to_string());
    let currency = meta.currency.unwrap_or_default();

    timestamps
        .iter()
        .enumerate()
        .map(|(i, &epoch)| {
            let timestamp = DateTime::from_timestamp(epoch + i64::from(gmt_offset), 0)
                .ok_or_else(|| TrendsimError::Feed {
                    ticker: ticker.to_string(),
                    reason: format!("timestamp {epoch} out of range"),
                })?
                .naive_utc();
            Ok(PriceObservation {
                timestamp,
                ticker: symbol.clone(),
                currency: currency.clone(),
                high: column(&quote.high, i),
                low: column(&quote.low, i),
                open: column(&quote.open, i),
                close: column(&quote.close, i),
                volume: column(&quote.volume, i),
                instrument: instrument.clone(),
            })
        })
        .collect()
}

pub fn read_chart_file<P: AsRef<Path>>(
    path: P,
    ticker: &str,
    requested_start: NaiveDateTime,
) -> Result<Vec<PriceObservation>, TrendsimError> {
    let payload = fs::read_to_string(path)?;
    decode_chart(ticker, &payload, requested_start)
}
