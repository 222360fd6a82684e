/// RSI (Relative Strength Index) over closing prices.
///
/// Average gain and loss are simple rolling means of the last `period` price
/// changes (not Wilder's recursive smoothing). The first defined value is at
/// index `period`. A window with no losses saturates to exactly 100.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    for i in period..closes.len() {
        let window = &closes[i - period..=i];
        if !window.iter().all(|c| c.is_finite()) {
            continue;
        }

        let (gain, loss) = window.windows(2).fold((0.0, 0.0), |(g, l), w| {
            let change = w[1] - w[0];
            if change > 0.0 {
                (g + change, l)
            } else {
                (g, l - change)
            }
        });
        let avg_gain = gain / period as f64;
        let avg_loss = loss / period as f64;

        out[i] = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_is_undefined_until_period_changes_exist() {
        let prices = vec![100.0; 14];
        assert!(rsi(&prices, 14).iter().all(|v| v.is_nan()));

        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&prices, 14);
        assert!(out[13].is_nan());
        assert!(out[14].is_finite());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let prices = vec![10.0, 11.0, 12.0, 13.0, 14.0];
        assert_eq!(rsi(&prices, 3)[4], 100.0);
    }

    #[test]
    fn rsi_flat_window_saturates() {
        let prices = vec![50.0; 20];
        assert_eq!(rsi(&prices, 14)[19], 100.0);
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let prices = vec![14.0, 13.0, 12.0, 11.0, 10.0];
        let value = rsi(&prices, 3)[4];
        assert!(value.abs() < 1e-9, "Expected ~0, got {value}");
    }

    #[test]
    fn rsi_known_value() {
        // gains 2+1 = 3, losses 1 over 4 changes: RS = 3, RSI = 75
        let prices = vec![10.0, 12.0, 11.0, 12.0, 12.0];
        let value = rsi(&prices, 4)[4];
        assert!((value - 75.0).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn rsi_stays_in_range() {
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09, 44.90, 45.30,
        ];
        for v in rsi(&prices, 14).into_iter().filter(|v| v.is_finite()) {
            assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
        }
    }
}
