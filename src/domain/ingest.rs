//! Incremental merge of fetched observations into stored history.
//!
//! Stored rows are keyed on (timestamp, ticker, currency). A fetched batch
//! only contributes rows whose key is complete and not yet stored.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use super::error::TrendsimError;
use super::observation::PriceObservation;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationKey {
    pub timestamp: NaiveDateTime,
    pub ticker: String,
    pub currency: String,
}

impl ObservationKey {
    pub fn new(timestamp: NaiveDateTime, ticker: &str, currency: &str) -> Self {
        ObservationKey {
            timestamp,
            ticker: ticker.to_string(),
            currency: currency.to_string(),
        }
    }

    /// `None` when the ticker or currency is blank.
    pub fn of(obs: &PriceObservation) -> Option<Self> {
        if obs.ticker.trim().is_empty() || obs.currency.trim().is_empty() {
            return None;
        }
        Some(Self::new(obs.timestamp, &obs.ticker, &obs.currency))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertPlan {
    pub inserts: Vec<PriceObservation>,
    pub already_stored: usize,
    pub incomplete: usize,
}

impl UpsertPlan {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
    }
}

/// Splits `incoming` into rows to insert and rows to drop.
///
/// A batch that repeats a key cannot be merged consistently and is rejected
/// as a whole.
pub fn plan_upsert(
    existing: &HashSet<ObservationKey>,
    incoming: Vec<PriceObservation>,
) -> Result<UpsertPlan, TrendsimError> {
    let mut plan = UpsertPlan::default();
    let mut seen: HashSet<ObservationKey> = HashSet::with_capacity(incoming.len());

    for obs in incoming {
        let Some(key) = ObservationKey::of(&obs) else {
            plan.incomplete += 1;
            continue;
        };
        if !seen.insert(key.clone()) {
            return Err(TrendsimError::IndexIntegrity {
                reason: format!(
                    "batch repeats key ({}, {}, {})",
                    key.timestamp, key.ticker, key.currency
                ),
            });
        }
        if existing.contains(&key) {
            plan.already_stored += 1;
            continue;
        }
        plan.inserts.push(obs);
    }

    Ok(plan)
}
