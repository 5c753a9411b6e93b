//! Trade date selection.
//!
//! Dates come either from an explicit list or from an inclusive range with
//! weekends and listed holidays removed.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalendarError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

pub fn parse_date(input: &str) -> Result<NaiveDate, CalendarError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| CalendarError::InvalidDate(trimmed.to_string()))
}

/// Parses a comma separated list, ignoring empty entries.
pub fn parse_date_list(input: &str) -> Result<Vec<NaiveDate>, CalendarError> {
    input
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(parse_date)
        .collect()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Weekdays in `start..=end` that are not holidays.
pub fn trading_days(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &[NaiveDate],
) -> Result<Vec<NaiveDate>, CalendarError> {
    if start > end {
        return Err(CalendarError::InvertedRange { start, end });
    }
    let holidays: BTreeSet<NaiveDate> = holidays.iter().copied().collect();

    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !is_weekend(*d) && !holidays.contains(d))
        .collect())
}

/// Sorted, de-duplicated copy of `dates`.
pub fn normalise(dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let unique: BTreeSet<NaiveDate> = dates.iter().copied().collect();
    unique.into_iter().collect()
}
