//! Price history access port.

use crate::domain::error::TrendsimError;
use crate::domain::observation::PriceObservation;
use chrono::NaiveDateTime;

pub trait PriceDataPort {
    /// Observations for `ticker` with `from <= timestamp < to`, in any order.
    fn fetch_prices(
        &self,
        ticker: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<PriceObservation>, TrendsimError>;

    fn list_tickers(&self) -> Result<Vec<String>, TrendsimError>;

    /// First timestamp, last timestamp and row count held for `ticker`.
    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TrendsimError>;
}
