//! Minute indexing of irregular intraday observations.
//!
//! Offsets are the regression x-axis. They are assigned by walking the
//! calendar one minute at a time from the first observed minute to the last.

use chrono::{Duration, NaiveDateTime, Timelike};
use std::str::FromStr;

use super::observation::PriceObservation;

/// How minutes without an observation affect the offsets that follow them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GapPolicy {
    /// Gap minutes consume no offset: minutes 0,1,2,5 map to 0,1,2,3.
    #[default]
    Compact,
    /// Offsets count elapsed minutes: minutes 0,1,2,5 map to 0,1,2,5.
    Elapsed,
}

impl FromStr for GapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(GapPolicy::Compact),
            "elapsed" => Ok(GapPolicy::Elapsed),
            other => Err(format!("unknown gap policy '{other}' (expected compact or elapsed)")),
        }
    }
}

pub fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// Assigns an offset to each timestamp.
///
/// `timestamps` must be sorted ascending with at most one entry per minute;
/// the result is aligned with the input. Empty input gives an empty result.
pub fn index_minutes(timestamps: &[NaiveDateTime], policy: GapPolicy) -> Vec<i64> {
    let mut offsets = Vec::with_capacity(timestamps.len());
    let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
        return offsets;
    };

    let end = truncate_to_minute(*last);
    let mut minute = truncate_to_minute(*first);
    let mut elapsed: i64 = 0;
    let mut next_compact: i64 = 0;
    let mut pending = timestamps.iter().map(|t| truncate_to_minute(*t)).peekable();

    while minute <= end {
        if pending.next_if_eq(&minute).is_some() {
            let offset = match policy {
                GapPolicy::Compact => next_compact,
                GapPolicy::Elapsed => elapsed,
            };
            offsets.push(offset);
            next_compact += 1;
        }
        minute += Duration::minutes(1);
        elapsed += 1;
    }

    offsets
}

/// Offsets for `lookahead` synthetic minutes after the last timestamp.
///
/// The indexer is re-run over the observed timestamps plus the synthetic ones
/// so the returned offsets continue the sequence of the observed ones.
pub fn extend_offsets(timestamps: &[NaiveDateTime], lookahead: usize, policy: GapPolicy) -> Vec<i64> {
    let Some(last) = timestamps.last().map(|t| truncate_to_minute(*t)) else {
        return Vec::new();
    };

    let mut extended: Vec<NaiveDateTime> = timestamps.iter().map(|t| truncate_to_minute(*t)).collect();
    extended.extend((1..=lookahead as i64).map(|m| last + Duration::minutes(m)));

    let offsets = index_minutes(&extended, policy);
    offsets[offsets.len().saturating_sub(lookahead)..].to_vec()
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    pub offset: i64,
    pub observation: PriceObservation,
}

/// One security's observations for one day, keyed by minute offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedSeries {
    entries: Vec<IndexedEntry>,
    policy: GapPolicy,
}

impl IndexedSeries {
    /// Sorts by time, keeps the last observation of any repeated minute and
    /// assigns offsets.
    pub fn build(mut observations: Vec<PriceObservation>, policy: GapPolicy) -> Self {
        observations.sort_by_key(|o| o.timestamp);

        let mut unique: Vec<PriceObservation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match unique.last_mut() {
                Some(prev)
                    if truncate_to_minute(prev.timestamp) == truncate_to_minute(obs.timestamp) =>
                {
                    *prev = obs;
                }
                _ => unique.push(obs),
            }
        }

        let timestamps: Vec<NaiveDateTime> = unique.iter().map(|o| o.timestamp).collect();
        let offsets = index_minutes(&timestamps, policy);

        let entries = offsets
            .into_iter()
            .zip(unique)
            .map(|(offset, observation)| IndexedEntry {
                offset,
                observation,
            })
            .collect();

        Self { entries, policy }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy(&self) -> GapPolicy {
        self.policy
    }

    pub fn entries(&self) -> &[IndexedEntry] {
        &self.entries
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.offset).collect()
    }

    pub fn mids(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.observation.mid()).collect()
    }

    /// Number of leading entries observed at or before `time`.
    pub fn cut_at(&self, time: NaiveDateTime) -> usize {
        self.entries
            .partition_point(|e| e.observation.timestamp <= time)
    }
}
