//! Trend and envelope lines over a trailing window.
//!
//! Three line kinds are fitted on (offset, mid) pairs:
//! - Full:  ordinary least squares over every point in the window
//! - Upper: the line through the highest value and the highest distinct runner-up
//! - Lower: the line through the lowest value and the lowest distinct runner-up
//!
//! Each line is evaluated at the window offsets followed by the lookahead
//! offsets, so the first and last points span past the observed data.

use std::fmt;

use super::error::TrendsimError;
use super::time_index::{extend_offsets, IndexedSeries};

pub const MIN_FIT_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrendKind {
    Full,
    Upper,
    Lower,
}

impl fmt::Display for TrendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendKind::Full => write!(f, "full"),
            TrendKind::Upper => write!(f, "upper"),
            TrendKind::Lower => write!(f, "lower"),
        }
    }
}

/// Predicted values of one fitted line, ordered by offset.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendLine {
    pub kind: TrendKind,
    pub points: Vec<(i64, f64)>,
}

impl TrendLine {
    /// (last value - first value) / (last offset - first offset); zero when
    /// the line spans a single offset.
    pub fn gradient(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(&(x0, y0)), Some(&(x1, y1))) if x1 != x0 => (y1 - y0) / (x1 - x0) as f64,
            _ => 0.0,
        }
    }

    pub fn first_value(&self) -> f64 {
        self.points.first().map(|p| p.1).unwrap_or(f64::NAN)
    }

    pub fn last_value(&self) -> f64 {
        self.points.last().map(|p| p.1).unwrap_or(f64::NAN)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSet {
    pub full: TrendLine,
    pub upper: TrendLine,
    pub lower: TrendLine,
}

impl TrendSet {
    /// Upper minus lower at the first evaluated offset.
    pub fn width_start(&self) -> f64 {
        self.upper.first_value() - self.lower.first_value()
    }

    /// Upper minus lower at the last evaluated offset.
    pub fn width_end(&self) -> f64 {
        self.upper.last_value() - self.lower.last_value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LineFit {
    slope: f64,
    intercept: f64,
}

impl LineFit {
    fn predict(&self, x: i64) -> f64 {
        self.intercept + self.slope * x as f64
    }
}

fn least_squares(points: &[(i64, f64)]) -> Result<LineFit, TrendsimError> {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0 as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), &(x, y)| {
        let dx = x as f64 - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });

    if sxx == 0.0 {
        return Err(TrendsimError::InsufficientData {
            points: 1,
            minimum: MIN_FIT_POINTS,
        });
    }

    let slope = sxy / sxx;
    Ok(LineFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Picks the two points an envelope line is drawn through.
///
/// The extreme pairs with the first offset it occurs at. The runner-up is the
/// most extreme value distinct from it, at its first offset; when every value
/// ties, the extreme is reused at its second offset.
fn envelope_points(window: &[(i64, f64)], kind: TrendKind) -> Result<[(i64, f64); 2], TrendsimError> {
    let beats = |a: f64, b: f64| match kind {
        TrendKind::Lower => a < b,
        _ => a > b,
    };
    let most = |acc: f64, v: f64| if beats(v, acc) { v } else { acc };

    let insufficient = || TrendsimError::InsufficientData {
        points: window.len(),
        minimum: MIN_FIT_POINTS,
    };

    let extreme = window.iter().map(|p| p.1).reduce(most).ok_or_else(insufficient)?;
    let runner_up = window
        .iter()
        .map(|p| p.1)
        .filter(|&v| v != extreme)
        .reduce(most);

    let mut at_extreme = window.iter().filter(|p| p.1 == extreme);
    let first = *at_extreme.next().ok_or_else(insufficient)?;

    let second = match runner_up {
        Some(value) => *window
            .iter()
            .find(|p| p.1 == value)
            .ok_or_else(insufficient)?,
        None => *at_extreme.next().ok_or_else(insufficient)?,
    };

    Ok([first, second])
}

/// Fits one line kind over `window` and evaluates it at the window offsets
/// followed by `future_offsets`.
pub fn fit_line(
    kind: TrendKind,
    window: &[(i64, f64)],
    future_offsets: &[i64],
) -> Result<TrendLine, TrendsimError> {
    if window.len() < MIN_FIT_POINTS || window.iter().any(|p| !p.1.is_finite()) {
        return Err(TrendsimError::InsufficientData {
            points: window.iter().filter(|p| p.1.is_finite()).count(),
            minimum: MIN_FIT_POINTS,
        });
    }

    let fit = match kind {
        TrendKind::Full => least_squares(window)?,
        TrendKind::Upper | TrendKind::Lower => least_squares(&envelope_points(window, kind)?)?,
    };

    let points = window
        .iter()
        .map(|p| p.0)
        .chain(future_offsets.iter().copied())
        .map(|x| (x, fit.predict(x)))
        .collect();

    Ok(TrendLine { kind, points })
}

pub fn fit_trends(window: &[(i64, f64)], future_offsets: &[i64]) -> Result<TrendSet, TrendsimError> {
    Ok(TrendSet {
        full: fit_line(TrendKind::Full, window, future_offsets)?,
        upper: fit_line(TrendKind::Upper, window, future_offsets)?,
        lower: fit_line(TrendKind::Lower, window, future_offsets)?,
    })
}

/// Fits trend lines over the trailing part of a series seen so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendEstimator {
    pub window: usize,
    pub lookahead: usize,
}

impl Default for TrendEstimator {
    fn default() -> Self {
        TrendEstimator {
            window: 10,
            lookahead: 10,
        }
    }
}

impl TrendEstimator {
    /// Fits over the last `window` of the first `upto` entries of `series`.
    ///
    /// Lookahead offsets are derived from every entry up to `upto` so they
    /// continue the day's offset sequence.
    pub fn fit(&self, series: &IndexedSeries, upto: usize) -> Result<TrendSet, TrendsimError> {
        let seen = &series.entries()[..upto.min(series.len())];
        let start = seen.len().saturating_sub(self.window);
        let window: Vec<(i64, f64)> = seen[start..]
            .iter()
            .map(|e| (e.offset, e.observation.mid()))
            .collect();

        if window.len() < MIN_FIT_POINTS {
            return Err(TrendsimError::InsufficientData {
                points: window.len(),
                minimum: MIN_FIT_POINTS,
            });
        }

        let timestamps: Vec<_> = seen.iter().map(|e| e.observation.timestamp).collect();
        let future = extend_offsets(&timestamps, self.lookahead, series.policy());
        fit_trends(&window, &future)
    }
}
