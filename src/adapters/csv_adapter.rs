//! CSV file price source.
//!
//! One file per ticker, `<data_dir>/<TICKER>.csv`, one row per minute:
//!
//! ```text
//! as_at,ticker,currency,high,low,open,close,volume,instrument_type,exchange_name,time_zone,gmt_offset
//! 2024-05-28 09:30:00,NVDA,USD,1101.5,1099.0,1100.0,1101.0,52000,EQUITY,NMS,America/New_York,-14400
//! ```
//!
//! Blank price fields read as missing (NaN).

use crate::domain::error::TrendsimError;
use crate::domain::observation::{InstrumentMeta, PriceObservation};
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct PriceRow {
    as_at: String,
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    currency: String,
    high: Option<f64>,
    low: Option<f64>,
    open: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
    #[serde(default)]
    instrument_type: String,
    #[serde(default)]
    exchange_name: String,
    #[serde(default)]
    time_zone: String,
    #[serde(default)]
    gmt_offset: Option<i32>,
}

impl PriceRow {
    fn into_observation(self, ticker: &str) -> Result<PriceObservation, TrendsimError> {
        let timestamp = NaiveDateTime::parse_from_str(self.as_at.trim(), TIMESTAMP_FORMAT)
            .map_err(|e| TrendsimError::Database {
                reason: format!("invalid as_at '{}': {}", self.as_at, e),
            })?;
        let nan = f64::NAN;
        Ok(PriceObservation {
            timestamp,
            ticker: if self.ticker.is_empty() {
                ticker.to_string()
            } else {
                self.ticker
            },
            currency: self.currency,
            high: self.high.unwrap_or(nan),
            low: self.low.unwrap_or(nan),
            open: self.open.unwrap_or(nan),
            close: self.close.unwrap_or(nan),
            volume: self.volume.unwrap_or(nan),
            instrument: InstrumentMeta {
                instrument_type: self.instrument_type,
                exchange_name: self.exchange_name,
                time_zone: self.time_zone,
                gmt_offset: self.gmt_offset.unwrap_or(0),
            },
        })
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    fn read_all(&self, ticker: &str) -> Result<Vec<PriceObservation>, TrendsimError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| TrendsimError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut observations = Vec::new();
        for result in rdr.deserialize::<PriceRow>() {
            let row = result.map_err(|e| TrendsimError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            observations.push(row.into_observation(ticker)?);
        }

        observations.sort_by_key(|o| o.timestamp);
        Ok(observations)
    }
}

impl PriceDataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<PriceObservation>, TrendsimError> {
        let mut observations = self.read_all(ticker)?;
        observations.retain(|o| o.timestamp >= from && o.timestamp < to);
        Ok(observations)
    }

    fn list_tickers(&self) -> Result<Vec<String>, TrendsimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TrendsimError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TrendsimError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            if let Some(ticker) = name.to_string_lossy().strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TrendsimError> {
        if !self.csv_path(ticker).exists() {
            return Ok(None);
        }
        let observations = self.read_all(ticker)?;
        Ok(match (observations.first(), observations.last()) {
            (Some(first), Some(last)) => {
                Some((first.timestamp, last.timestamp, observations.len()))
            }
            _ => None,
        })
    }
}
