//! Minute-by-minute replay of trading sessions.
//!
//! Every (security, day) pair runs as its own [`SecuritySession`] with a
//! fresh state machine. The session clock starts at `session_open` and
//! ticks once a minute while it is before `session_close`. On each tick the
//! latest observation at or before the clock is the snapshot: its mid price
//! is the trade price, and the trend fit covers the trailing
//! `reverse_points` entries seen so far. Rows without a finite mid price are
//! dropped before the session starts.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, error, info, warn};

use super::error::TrendsimError;
use super::metrics::TickerSummary;
use super::observation::{drop_missing, PriceObservation};
use super::position::{TradeStateMachine, Transition};
use super::signal::{decide, SignalThresholds};
use super::time_index::{GapPolicy, IndexedSeries};
use super::trend::TrendEstimator;
use crate::ports::data_port::PriceDataPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 1_000_000.0;
pub const DEFAULT_REVERSE_POINTS: usize = 10;
pub const DEFAULT_LOOKAHEAD: usize = 10;

pub fn default_session_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN)
}

pub fn default_session_close() -> NaiveTime {
    NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub tickers: Vec<String>,
    pub trade_dates: Vec<NaiveDate>,
    pub initial_capital: Option<f64>,
    pub session_open: NaiveTime,
    pub session_close: NaiveTime,
    pub reverse_points: usize,
    pub lookahead: usize,
    pub gap_policy: GapPolicy,
    pub thresholds: SignalThresholds,
}

impl SimulationConfig {
    pub fn new(tickers: Vec<String>, trade_dates: Vec<NaiveDate>) -> Self {
        SimulationConfig {
            tickers,
            trade_dates,
            ..Default::default()
        }
    }

    pub fn estimator(&self) -> TrendEstimator {
        TrendEstimator {
            window: self.reverse_points,
            lookahead: self.lookahead,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tickers: Vec::new(),
            trade_dates: Vec::new(),
            initial_capital: Some(DEFAULT_INITIAL_CAPITAL),
            session_open: default_session_open(),
            session_close: default_session_close(),
            reverse_points: DEFAULT_REVERSE_POINTS,
            lookahead: DEFAULT_LOOKAHEAD,
            gap_policy: GapPolicy::default(),
            thresholds: SignalThresholds::default(),
        }
    }
}

/// Outcome of one security on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyResult {
    pub date: NaiveDate,
    pub ticker: String,
    /// Fraction, 0.05 means +5%.
    pub return_pct: f64,
    pub trade_count: u32,
    pub net_market_value: f64,
    pub bust: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Bust,
}

pub struct SecuritySession {
    date: NaiveDate,
    series: IndexedSeries,
    mids: Vec<f64>,
    estimator: TrendEstimator,
    thresholds: SignalThresholds,
    initial_capital: Option<f64>,
    machine: TradeStateMachine,
    last_price: Option<f64>,
    bust: bool,
}

impl SecuritySession {
    pub fn new(
        ticker: &str,
        date: NaiveDate,
        series: IndexedSeries,
        config: &SimulationConfig,
    ) -> Self {
        let series = if series.entries().iter().all(|e| e.observation.has_mid()) {
            series
        } else {
            let rows = series.entries().iter().map(|e| e.observation.clone()).collect();
            IndexedSeries::build(drop_missing(rows), series.policy())
        };
        let mids = series.mids();
        SecuritySession {
            date,
            series,
            mids,
            estimator: config.estimator(),
            thresholds: config.thresholds,
            initial_capital: config.initial_capital,
            machine: TradeStateMachine::new(ticker, config.initial_capital),
            last_price: None,
            bust: false,
        }
    }

    pub fn machine(&self) -> &TradeStateMachine {
        &self.machine
    }

    /// Advances the session to `now`.
    pub fn step(&mut self, now: NaiveDateTime) -> Result<StepOutcome, TrendsimError> {
        if self.bust || self.machine.is_bust() {
            self.bust = true;
            return Ok(StepOutcome::Bust);
        }

        let upto = self.series.cut_at(now);
        if upto == 0 {
            return Ok(StepOutcome::Continue);
        }

        let price = self.mids[upto - 1];
        self.last_price = Some(price);

        let buy = match self.estimator.fit(&self.series, upto) {
            Ok(trends) => {
                let decision = decide(
                    &trends,
                    &self.mids[..upto],
                    self.estimator.window,
                    &self.thresholds,
                );
                decision.buy
            }
            Err(TrendsimError::InsufficientData { .. }) => false,
            Err(e) => return Err(e),
        };

        if let Some(transition) = self.machine.on_signal(buy, price, self.initial_capital)? {
            match transition {
                Transition::Bought { shares, price } => {
                    debug!(ticker = %self.machine.ticker, %now, shares, price, "buy")
                }
                Transition::Sold { proceeds, price } => {
                    debug!(ticker = %self.machine.ticker, %now, proceeds, price, "sell")
                }
            }
        }

        Ok(StepOutcome::Continue)
    }

    /// Runs every tick from `open` while before `close`, stopping early on bust.
    pub fn run(&mut self, open: NaiveTime, close: NaiveTime) -> Result<(), TrendsimError> {
        let end = self.date.and_time(close);
        let mut now = self.date.and_time(open);
        while now < end {
            if self.step(now)? == StepOutcome::Bust {
                warn!(ticker = %self.machine.ticker, date = %self.date, %now, "position bust, halting");
                break;
            }
            now += Duration::minutes(1);
        }
        Ok(())
    }

    /// Closes the session, valuing any open holding at the last snapshot price.
    pub fn finish(self) -> DailyResult {
        let bust = self.bust || self.machine.is_bust();
        let held = match self.last_price {
            Some(price) => self.machine.mark_to_market(price),
            None => self.machine.net_market_value(),
        };
        let net_market_value = held.or(self.initial_capital).unwrap_or(0.0);

        let return_pct = match self.initial_capital {
            Some(capital) if capital != 0.0 => net_market_value / capital - 1.0,
            _ => 0.0,
        };

        DailyResult {
            date: self.date,
            ticker: self.machine.ticker,
            return_pct,
            trade_count: self.machine.trade_count,
            net_market_value,
            bust,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    pub results: Vec<DailyResult>,
}

impl SimulationReport {
    pub fn summaries(&self) -> Vec<TickerSummary> {
        TickerSummary::compute_per_ticker(&self.results)
    }
}

pub struct PortfolioSimulator<'a> {
    data: &'a dyn PriceDataPort,
    config: SimulationConfig,
}

fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn next_day_start(date: NaiveDate) -> NaiveDateTime {
    date.succ_opt().map_or(NaiveDateTime::MAX, day_start)
}

impl<'a> PortfolioSimulator<'a> {
    pub fn new(data: &'a dyn PriceDataPort, config: SimulationConfig) -> Self {
        PortfolioSimulator { data, config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn fetch_or_empty(
        &self,
        ticker: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Vec<PriceObservation> {
        match self.data.fetch_prices(ticker, from, to) {
            Ok(rows) => rows,
            Err(e) => {
                error!(ticker, %from, %to, error = %e, "price fetch failed");
                Vec::new()
            }
        }
    }

    /// One fetch per ticker covering every trade date, bucketed by day.
    fn preload(&self, ticker: &str) -> BTreeMap<NaiveDate, Vec<PriceObservation>> {
        let mut by_day: BTreeMap<NaiveDate, Vec<PriceObservation>> = BTreeMap::new();
        let (Some(first), Some(last)) = (
            self.config.trade_dates.iter().min(),
            self.config.trade_dates.iter().max(),
        ) else {
            return by_day;
        };

        for obs in self.fetch_or_empty(ticker, day_start(*first), next_day_start(*last)) {
            by_day.entry(obs.timestamp.date()).or_default().push(obs);
        }
        by_day
    }

    fn day_series(
        &self,
        ticker: &str,
        date: NaiveDate,
        preloaded: Option<Vec<PriceObservation>>,
    ) -> IndexedSeries {
        let mut rows = drop_missing(preloaded.unwrap_or_default());
        if rows.is_empty() {
            debug!(ticker, %date, "no preloaded rows, fetching day");
            rows = drop_missing(self.fetch_or_empty(ticker, day_start(date), next_day_start(date)));
        }
        rows.retain(|o| o.timestamp.date() == date);
        if rows.is_empty() {
            warn!(ticker, %date, "no price data");
        }
        IndexedSeries::build(rows, self.config.gap_policy)
    }

    pub fn run_session(
        &self,
        ticker: &str,
        date: NaiveDate,
        series: IndexedSeries,
    ) -> Result<DailyResult, TrendsimError> {
        let mut session = SecuritySession::new(ticker, date, series, &self.config);
        session.run(self.config.session_open, self.config.session_close)?;
        Ok(session.finish())
    }

    pub fn run(&self) -> Result<SimulationReport, TrendsimError> {
        let mut preloaded: HashMap<&str, BTreeMap<NaiveDate, Vec<PriceObservation>>> = self
            .config
            .tickers
            .iter()
            .map(|t| (t.as_str(), self.preload(t)))
            .collect();

        let mut dates = self.config.trade_dates.clone();
        dates.sort();
        dates.dedup();

        let mut results = Vec::with_capacity(dates.len() * self.config.tickers.len());
        for date in dates {
            for ticker in &self.config.tickers {
                let rows = preloaded
                    .get_mut(ticker.as_str())
                    .and_then(|days| days.remove(&date));
                let series = self.day_series(ticker, date, rows);
                let result = self.run_session(ticker, date, series)?;

                info!(
                    ticker = %result.ticker,
                    date = %result.date,
                    return_pct = result.return_pct,
                    trades = result.trade_count,
                    bust = result.bust,
                    "session complete"
                );
                results.push(result);
            }
        }

        Ok(SimulationReport { results })
    }
}
