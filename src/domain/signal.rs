//! Buy/hold decision from trend lines and volatility.
//!
//! Rules are a decision list evaluated top to bottom; the first match wins:
//! 1. trend gradient <= min_trend_gradient        -> hold
//! 2. trailing volatility > whole-day volatility  -> hold
//! 3. upper and lower gradients both positive     -> buy
//! 4. |width at start| < max_start_width and the
//!    envelope narrows (start - end > 0)          -> buy
//! 5. otherwise                                   -> hold

use std::fmt;

use super::trend::TrendSet;
use super::volatility::sample_stddev;

/// Hand-tuned cut-offs for the decision list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    pub min_trend_gradient: f64,
    pub max_start_width: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        SignalThresholds {
            min_trend_gradient: 0.1,
            max_start_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalFeatures {
    pub trend_gradient: f64,
    pub upper_gradient: f64,
    pub lower_gradient: f64,
    pub width_start: f64,
    pub width_end: f64,
    pub trailing_volatility: f64,
    pub daily_volatility: f64,
}

impl SignalFeatures {
    /// `trailing_values` is the tail of `daily_values` the decision looks at.
    pub fn compute(trends: &TrendSet, trailing_values: &[f64], daily_values: &[f64]) -> Self {
        SignalFeatures {
            trend_gradient: trends.full.gradient(),
            upper_gradient: trends.upper.gradient(),
            lower_gradient: trends.lower.gradient(),
            width_start: trends.width_start(),
            width_end: trends.width_end(),
            trailing_volatility: sample_stddev(trailing_values),
            daily_volatility: sample_stddev(daily_values),
        }
    }
}

/// Which rule of the decision list produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionBranch {
    WeakTrend,
    ExcessVolatility,
    RisingEnvelope,
    NarrowingEnvelope,
    NoSetup,
}

impl DecisionBranch {
    pub fn is_buy(self) -> bool {
        matches!(
            self,
            DecisionBranch::RisingEnvelope | DecisionBranch::NarrowingEnvelope
        )
    }
}

impl fmt::Display for DecisionBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecisionBranch::WeakTrend => "weak-trend",
            DecisionBranch::ExcessVolatility => "excess-volatility",
            DecisionBranch::RisingEnvelope => "rising-envelope",
            DecisionBranch::NarrowingEnvelope => "narrowing-envelope",
            DecisionBranch::NoSetup => "no-setup",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub features: SignalFeatures,
    pub branch: DecisionBranch,
    pub buy: bool,
}

pub fn classify(features: &SignalFeatures, thresholds: &SignalThresholds) -> DecisionBranch {
    if features.trend_gradient <= thresholds.min_trend_gradient {
        DecisionBranch::WeakTrend
    } else if features.trailing_volatility > features.daily_volatility {
        DecisionBranch::ExcessVolatility
    } else if features.upper_gradient > 0.0 && features.lower_gradient > 0.0 {
        DecisionBranch::RisingEnvelope
    } else if features.width_start.abs() < thresholds.max_start_width
        && features.width_start - features.width_end > 0.0
    {
        DecisionBranch::NarrowingEnvelope
    } else {
        DecisionBranch::NoSetup
    }
}

/// Evaluates the decision list for one tick.
///
/// `daily_values` are the mid prices seen so far today; the trailing
/// volatility uses the last `reverse_points` of them.
pub fn decide(
    trends: &TrendSet,
    daily_values: &[f64],
    reverse_points: usize,
    thresholds: &SignalThresholds,
) -> Decision {
    let start = daily_values.len().saturating_sub(reverse_points);
    let features = SignalFeatures::compute(trends, &daily_values[start..], daily_values);
    let branch = classify(&features, thresholds);
    Decision {
        features,
        branch,
        buy: branch.is_buy(),
    }
}
