#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::cell::RefCell;
use std::collections::HashMap;
pub use trendsim::domain::error::TrendsimError;
pub use trendsim::domain::observation::PriceObservation;
use trendsim::ports::data_port::PriceDataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceObservation>>,
    pub errors: HashMap<String, String>,
    /// Requests spanning more than one day return nothing.
    pub single_day_only: bool,
    pub calls: RefCell<Vec<(String, NaiveDateTime, NaiveDateTime)>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            single_day_only: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_prices(mut self, ticker: &str, rows: Vec<PriceObservation>) -> Self {
        self.data.entry(ticker.to_string()).or_default().extend(rows);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn single_day_only(mut self) -> Self {
        self.single_day_only = true;
        self
    }

    pub fn call_count(&self, ticker: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.0 == ticker).count()
    }
}

impl PriceDataPort for MockDataPort {
    fn fetch_prices(
        &self,
        ticker: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<PriceObservation>, TrendsimError> {
        self.calls.borrow_mut().push((ticker.to_string(), from, to));
        if let Some(reason) = self.errors.get(ticker) {
            return Err(TrendsimError::Database {
                reason: reason.clone(),
            });
        }
        if self.single_day_only && to - from > Duration::days(1) {
            return Ok(Vec::new());
        }
        Ok(self
            .data
            .get(ticker)
            .map(|rows| {
                rows.iter()
                    .filter(|o| o.timestamp >= from && o.timestamp < to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_tickers(&self) -> Result<Vec<String>, TrendsimError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TrendsimError> {
        match self.data.get(ticker) {
            Some(rows) if !rows.is_empty() => {
                let min = rows.iter().map(|o| o.timestamp).min().unwrap();
                let max = rows.iter().map(|o| o.timestamp).max().unwrap();
                Ok(Some((min, max, rows.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Observation at `minute` minutes after 09:30 on `day` with the given mid.
pub fn make_obs(ticker: &str, day: &str, minute: i64, mid: f64) -> PriceObservation {
    PriceObservation {
        timestamp: date(day).and_hms_opt(9, 30, 0).unwrap() + Duration::minutes(minute),
        ticker: ticker.to_string(),
        currency: "USD".to_string(),
        high: mid + 0.25,
        low: mid - 0.25,
        open: mid,
        close: mid,
        volume: 1_000.0,
        instrument: Default::default(),
    }
}

pub fn flat_session(ticker: &str, day: &str, minutes: i64, mid: f64) -> Vec<PriceObservation> {
    (0..minutes).map(|m| make_obs(ticker, day, m, mid)).collect()
}

pub fn rising_session(
    ticker: &str,
    day: &str,
    minutes: i64,
    start: f64,
    step: f64,
) -> Vec<PriceObservation> {
    (0..minutes)
        .map(|m| make_obs(ticker, day, m, start + step * m as f64))
        .collect()
}
