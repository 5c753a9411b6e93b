//! Sample standard deviation of mid prices.
//!
//! STDDEV = sqrt(sum((x - mean)^2) / (n - 1)) over the finite values only.
//! Fewer than two finite values yields NaN, which never compares greater than
//! anything in the decision list.

pub fn sample_stddev(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n = finite.len();
    if n < 2 {
        return f64::NAN;
    }

    let mean: f64 = finite.iter().sum::<f64>() / n as f64;
    let variance: f64 = finite
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1) as f64;

    variance.sqrt()
}
