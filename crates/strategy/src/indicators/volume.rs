use super::sma::sma;

/// Current volume divided by its `period`-candle simple average.
/// A zero average (no traded volume in the window) gives a ratio of 0.
pub fn volume_ratio(volumes: &[f64], period: usize) -> Vec<f64> {
    let avg = sma(volumes, period);
    volumes
        .iter()
        .zip(&avg)
        .map(|(&v, &a)| {
            if !a.is_finite() || !v.is_finite() {
                f64::NAN
            } else if a == 0.0 {
                0.0
            } else {
                v / a
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_ratio_against_window_average() {
        let mut volumes = vec![100.0; 19];
        volumes.push(300.0);
        let out = volume_ratio(&volumes, 20);
        // average = (19 * 100 + 300) / 20 = 110
        assert!((out[19] - 300.0 / 110.0).abs() < 1e-12);
        assert!(out[18].is_nan());
    }

    #[test]
    fn zero_volume_saturates_to_zero() {
        let out = volume_ratio(&[0.0; 5], 3);
        assert_eq!(out[4], 0.0);
    }
}
