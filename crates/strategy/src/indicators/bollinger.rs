use super::sma::{rolling_std, sma};

/// Bollinger Bands
///
/// - Middle Band = SMA(period)
/// - Upper/Lower Band = Middle ± std_dev × rolling sample standard deviation
/// - Width = (Upper − Lower) / |Middle|
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub period: usize,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerOutput {
    pub middle: Vec<f64>,
    pub std: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    pub width: Vec<f64>,
    /// Distance of the close above the upper band, in percent of the middle band.
    pub dist_upper: Vec<f64>,
    /// Distance of the close above the lower band (negative below it).
    pub dist_lower: Vec<f64>,
    /// 1.0 where close >= upper band.
    pub touch_upper: Vec<f64>,
    /// 1.0 where close <= lower band.
    pub touch_lower: Vec<f64>,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev: f64) -> Self {
        Self { period, std_dev }
    }

    pub fn compute(&self, closes: &[f64]) -> BollingerOutput {
        let middle = sma(closes, self.period);
        let std = rolling_std(closes, self.period);
        let n = closes.len();

        let mut upper = vec![f64::NAN; n];
        let mut lower = vec![f64::NAN; n];
        let mut width = vec![f64::NAN; n];
        let mut dist_upper = vec![f64::NAN; n];
        let mut dist_lower = vec![f64::NAN; n];
        let mut touch_upper = vec![0.0; n];
        let mut touch_lower = vec![0.0; n];

        for i in 0..n {
            let (m, s, close) = (middle[i], std[i], closes[i]);
            if !(m.is_finite() && s.is_finite()) {
                continue;
            }
            upper[i] = m + self.std_dev * s;
            lower[i] = m - self.std_dev * s;

            if m != 0.0 {
                width[i] = (upper[i] - lower[i]) / m.abs();
                if close.is_finite() {
                    dist_upper[i] = (close - upper[i]) / m * 100.0;
                    dist_lower[i] = (close - lower[i]) / m * 100.0;
                }
            }
            if close >= upper[i] {
                touch_upper[i] = 1.0;
            }
            if close <= lower[i] {
                touch_lower[i] = 1.0;
            }
        }

        BollingerOutput {
            middle,
            std,
            upper,
            lower,
            width,
            dist_upper,
            dist_lower,
            touch_upper,
            touch_lower,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_centered_on_sma() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        let out = BollingerBands::new(20, 2.0).compute(&closes);
        let i = 29;
        assert!((out.upper[i] - out.middle[i] - 2.0 * out.std[i]).abs() < 1e-12);
        assert!((out.middle[i] - out.lower[i] - 2.0 * out.std[i]).abs() < 1e-12);
        assert!(out.width[i] >= 0.0);
        assert!(out.upper[18].is_nan());
    }

    #[test]
    fn known_band_values() {
        // window 1..=5: mean 3, sample std sqrt(2.5)
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = BollingerBands::new(5, 2.0).compute(&closes);
        let std = 2.5f64.sqrt();
        assert!((out.upper[4] - (3.0 + 2.0 * std)).abs() < 1e-12);
        assert!((out.width[4] - (4.0 * std / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn flat_prices_give_zero_width_and_touch_both_bands() {
        let out = BollingerBands::new(10, 2.0).compute(&[50.0; 12]);
        assert_eq!(out.width[11], 0.0);
        assert_eq!(out.touch_upper[11], 1.0);
        assert_eq!(out.touch_lower[11], 1.0);
    }

    #[test]
    fn zero_middle_band_leaves_ratios_undefined() {
        let out = BollingerBands::new(3, 2.0).compute(&[0.0; 4]);
        assert!(out.width[3].is_nan());
        assert!(out.dist_upper[3].is_nan());
    }

    #[test]
    fn spike_above_upper_band() {
        let mut closes: Vec<f64> = (0..19).map(|i| if i % 2 == 0 { 49.9 } else { 50.1 }).collect();
        closes.push(80.0);
        let out = BollingerBands::new(20, 2.0).compute(&closes);
        assert!(out.dist_upper[19] > 5.0);
        assert_eq!(out.touch_upper[19], 1.0);
        assert_eq!(out.touch_lower[19], 0.0);
    }
}
