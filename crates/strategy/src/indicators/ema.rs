//! Exponentially weighted means with adjust-free seeding.
//!
//! The recursion is `y[0] = x[0]`, `y[t] = alpha * x[t] + (1 - alpha) * y[t-1]`,
//! started at the first defined input. An undefined input after seeding
//! carries the previous value forward.

/// EMA with `alpha = 2 / (span + 1)`.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    ewm(values, 2.0 / (span as f64 + 1.0))
}

/// Wilder smoothing, `alpha = 1 / period`.
pub fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    ewm(values, 1.0 / period.max(1) as f64)
}

pub fn ewm(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let mut prev: Option<f64> = None;

    for (i, &x) in values.iter().enumerate() {
        prev = match (prev, x.is_finite()) {
            (None, true) => Some(x),
            (None, false) => None,
            (Some(p), true) => Some(alpha * x + (1.0 - alpha) * p),
            (Some(p), false) => Some(p),
        };
        if let Some(v) = prev {
            out[i] = v;
        }
    }
    out
}
