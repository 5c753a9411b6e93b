//! Report output port.

use crate::domain::error::TrendsimError;
use crate::domain::simulator::DailyResult;

/// Port for writing per security-day results.
pub trait ReportPort {
    fn write(&self, results: &[DailyResult], output_path: &str) -> Result<(), TrendsimError>;
}
