use super::sma::sma;

/// True range: max(high − low, |high − prev close|, |low − prev close|).
/// Undefined on the first candle, which has no previous close.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = close.len();
    let mut out = vec![f64::NAN; n];
    for i in 1..n {
        let prev = close[i - 1];
        out[i] = (high[i] - low[i])
            .max((high[i] - prev).abs())
            .max((low[i] - prev).abs());
    }
    out
}

/// Average True Range: simple mean of the true range over `period` candles.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    sma(&true_range(high, low, close), period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_range_uses_previous_close_gaps() {
        let high = [10.0, 12.0, 11.0];
        let low = [9.0, 11.5, 8.0];
        let close = [9.5, 11.8, 8.5];
        let tr = true_range(&high, &low, &close);
        assert!(tr[0].is_nan());
        assert!((tr[1] - 2.5).abs() < 1e-12); // 12 - 9.5
        assert!((tr[2] - 3.8).abs() < 1e-12); // 11.8 - 8
    }

    #[test]
    fn atr_first_value_needs_period_plus_one_candles() {
        let high = vec![11.0; 6];
        let low = vec![9.0; 6];
        let close = vec![10.0; 6];
        let out = atr(&high, &low, &close, 5);
        assert!(out[4].is_nan());
        assert_eq!(out[5], 2.0);
    }
}
