//! Return-based features used by the ML feature set.

use super::sma::{rolling_max, rolling_min, rolling_std};

/// Simple percentage change `close[i] / close[i-1] - 1`.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        let prev = values[i - 1];
        if prev != 0.0 && prev.is_finite() && values[i].is_finite() {
            out[i] = values[i] / prev - 1.0;
        }
    }
    out
}

/// Natural log of `close[i] / close[i-1]`.
pub fn log_returns(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        let (prev, cur) = (values[i - 1], values[i]);
        if prev > 0.0 && cur > 0.0 {
            out[i] = (cur / prev).ln();
        }
    }
    out
}

/// Rolling sample standard deviation of simple returns.
pub fn volatility(closes: &[f64], period: usize) -> Vec<f64> {
    rolling_std(&pct_change(closes), period)
}

/// Where the close sits inside the rolling high/low range, 0 (at the low) to
/// 1 (at the high). A zero range reports the midpoint.
pub fn price_position(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let lowest = rolling_min(low, period);
    let highest = rolling_max(high, period);
    close
        .iter()
        .zip(lowest.iter().zip(&highest))
        .map(|(&c, (&lo, &hi))| {
            if !(lo.is_finite() && hi.is_finite() && c.is_finite()) {
                f64::NAN
            } else if hi - lo == 0.0 {
                0.5
            } else {
                (c - lo) / (hi - lo)
            }
        })
        .collect()
}

/// `values` shifted forward by `lag` positions (index i holds `values[i - lag]`).
pub fn lag(values: &[f64], lag: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in lag..values.len() {
        out[i] = values[i - lag];
    }
    out
}
