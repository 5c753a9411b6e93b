//! Minute price observation.

use chrono::NaiveDateTime;

/// Static description of the listed instrument, repeated on every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentMeta {
    pub instrument_type: String,
    pub exchange_name: String,
    pub time_zone: String,
    pub gmt_offset: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub timestamp: NaiveDateTime,
    pub ticker: String,
    pub currency: String,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
    pub instrument: InstrumentMeta,
}

impl PriceObservation {
    /// Stand-in row for a time range the feed returned nothing for.
    pub fn placeholder(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            ticker: String::new(),
            currency: String::new(),
            high: f64::NAN,
            low: f64::NAN,
            open: f64::NAN,
            close: f64::NAN,
            volume: f64::NAN,
            instrument: InstrumentMeta::default(),
        }
    }

    /// (high + low) / 2
    pub fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// True when none of the price columns carry a value.
    pub fn is_missing(&self) -> bool {
        self.high.is_nan() && self.low.is_nan() && self.open.is_nan() && self.close.is_nan()
    }

    /// True when the row can be traded on: both high and low are finite.
    pub fn has_mid(&self) -> bool {
        self.mid().is_finite()
    }
}

/// Drops rows without a usable mid price, placeholders included. Rows missing
/// only open, close or volume are kept.
pub fn drop_missing(observations: Vec<PriceObservation>) -> Vec<PriceObservation> {
    observations.into_iter().filter(PriceObservation::has_mid).collect()
}
