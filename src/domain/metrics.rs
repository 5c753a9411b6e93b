//! Per-ticker aggregation of daily session results.

use std::collections::BTreeMap;

use super::simulator::DailyResult;

#[derive(Debug, Clone, PartialEq)]
pub struct TickerSummary {
    pub ticker: String,
    pub days: usize,
    pub total_trades: u32,
    pub mean_daily_return: f64,
    /// Product of (1 + daily return) over all days, minus one.
    pub compounded_return: f64,
    pub best_day: f64,
    pub worst_day: f64,
    pub bust_days: usize,
}

impl TickerSummary {
    pub fn compute(ticker: &str, results: &[&DailyResult]) -> Self {
        let days = results.len();
        let total_trades = results.iter().map(|r| r.trade_count).sum();
        let bust_days = results.iter().filter(|r| r.bust).count();

        let mean_daily_return = if days > 0 {
            results.iter().map(|r| r.return_pct).sum::<f64>() / days as f64
        } else {
            0.0
        };

        let compounded_return = results
            .iter()
            .fold(1.0, |acc, r| acc * (1.0 + r.return_pct))
            - 1.0;

        let best_day = results
            .iter()
            .map(|r| r.return_pct)
            .fold(f64::NEG_INFINITY, f64::max);
        let worst_day = results
            .iter()
            .map(|r| r.return_pct)
            .fold(f64::INFINITY, f64::min);

        TickerSummary {
            ticker: ticker.to_string(),
            days,
            total_trades,
            mean_daily_return,
            compounded_return,
            best_day: if days > 0 { best_day } else { 0.0 },
            worst_day: if days > 0 { worst_day } else { 0.0 },
            bust_days,
        }
    }

    /// One summary per ticker, sorted by ticker.
    pub fn compute_per_ticker(results: &[DailyResult]) -> Vec<Self> {
        let mut grouped: BTreeMap<&str, Vec<&DailyResult>> = BTreeMap::new();
        for r in results {
            grouped.entry(r.ticker.as_str()).or_default().push(r);
        }

        grouped
            .into_iter()
            .map(|(ticker, rows)| Self::compute(ticker, &rows))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn result(ticker: &str, day: u32, return_pct: f64, trades: u32, bust: bool) -> DailyResult {
        DailyResult {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            ticker: ticker.into(),
            return_pct,
            trade_count: trades,
            net_market_value: 1_000_000.0 * (1.0 + return_pct),
            bust,
        }
    }

    #[test]
    fn empty_results_give_no_summaries() {
        assert!(TickerSummary::compute_per_ticker(&[]).is_empty());
    }

    #[test]
    fn summary_of_no_days_is_zero() {
        let s = TickerSummary::compute("NVDA", &[]);
        assert_eq!(s.days, 0);
        assert_eq!(s.compounded_return, 0.0);
        assert_eq!(s.best_day, 0.0);
        assert_eq!(s.worst_day, 0.0);
    }

    #[test]
    fn groups_and_sorts_by_ticker() {
        let results = vec![
            result("TSLA", 28, 0.01, 1, false),
            result("AAPL", 28, -0.02, 2, false),
            result("TSLA", 29, 0.03, 3, true),
        ];
        let summaries = TickerSummary::compute_per_ticker(&results);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].ticker, "AAPL");
        assert_eq!(summaries[1].ticker, "TSLA");

        let tsla = &summaries[1];
        assert_eq!(tsla.days, 2);
        assert_eq!(tsla.total_trades, 4);
        assert_eq!(tsla.bust_days, 1);
        assert_relative_eq!(tsla.mean_daily_return, 0.02, epsilon = 1e-12);
        assert_relative_eq!(tsla.compounded_return, 1.01 * 1.03 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(tsla.best_day, 0.03);
        assert_relative_eq!(tsla.worst_day, 0.01);
    }
}
