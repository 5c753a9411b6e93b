//! CSV report adapter implementing ReportPort.
//!
//! One row per security-day: `Date,Ticker,Return,TradeCount`.

use std::fs::File;

use serde::Serialize;

use crate::domain::calendar::DATE_FORMAT;
use crate::domain::error::TrendsimError;
use crate::domain::simulator::DailyResult;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Ticker")]
    ticker: &'a str,
    #[serde(rename = "Return")]
    return_pct: f64,
    #[serde(rename = "TradeCount")]
    trade_count: u32,
}

impl<'a> From<&'a DailyResult> for ReportRow<'a> {
    fn from(r: &'a DailyResult) -> Self {
        ReportRow {
            date: r.date.format(DATE_FORMAT).to_string(),
            ticker: &r.ticker,
            return_pct: r.return_pct,
            trade_count: r.trade_count,
        }
    }
}

fn csv_err(e: csv::Error) -> TrendsimError {
    TrendsimError::Io(std::io::Error::other(e))
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }

    pub fn write_to<W: std::io::Write>(
        &self,
        results: &[DailyResult],
        out: W,
    ) -> Result<(), TrendsimError> {
        let mut writer = csv::Writer::from_writer(out);
        if results.is_empty() {
            writer
                .write_record(["Date", "Ticker", "Return", "TradeCount"])
                .map_err(csv_err)?;
        }
        for result in results {
            writer.serialize(ReportRow::from(result)).map_err(csv_err)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, results: &[DailyResult], output_path: &str) -> Result<(), TrendsimError> {
        let file = File::create(output_path)?;
        self.write_to(results, file)
    }
}
