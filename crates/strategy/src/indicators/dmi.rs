use super::atr::true_range;
use super::ema::wilder;

/// Wilder's directional movement system: +DI, −DI and ADX.
///
/// TR, +DM and −DM are smoothed with Wilder's recursion (alpha = 1/period)
/// starting at the second candle. Degenerate ratios resolve to 0 instead of
/// propagating NaN: a zero smoothed range gives DI = 0, and DI+ + DI− = 0 gives
/// DX = 0. DI values are undefined before index `period`, ADX before
/// `2 * period - 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dmi {
    pub period: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DmiOutput {
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
    pub adx: Vec<f64>,
}

impl Dmi {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn compute(&self, high: &[f64], low: &[f64], close: &[f64]) -> DmiOutput {
        let n = close.len();
        let tr = true_range(high, low, close);

        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];
        for i in 1..n {
            let up = high[i] - high[i - 1];
            let down = low[i - 1] - low[i];
            plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
            minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        }

        let tr_s = wilder(&tr, self.period);
        let plus_s = wilder(&plus_dm, self.period);
        let minus_s = wilder(&minus_dm, self.period);

        let mut plus_di = vec![f64::NAN; n];
        let mut minus_di = vec![f64::NAN; n];
        let mut dx = vec![f64::NAN; n];
        for i in 1..n {
            let (t, p, m) = (tr_s[i], plus_s[i], minus_s[i]);
            if !(t.is_finite() && p.is_finite() && m.is_finite()) {
                continue;
            }
            let (pdi, mdi) = if t > 0.0 {
                (100.0 * p / t, 100.0 * m / t)
            } else {
                (0.0, 0.0)
            };
            plus_di[i] = pdi;
            minus_di[i] = mdi;
            let sum = pdi + mdi;
            dx[i] = if sum > 0.0 {
                100.0 * (pdi - mdi).abs() / sum
            } else {
                0.0
            };
        }

        let mut adx = wilder(&dx, self.period);

        let di_start = self.period.min(n);
        let adx_start = (2 * self.period).saturating_sub(1).min(n);
        plus_di[..di_start].iter_mut().for_each(|v| *v = f64::NAN);
        minus_di[..di_start].iter_mut().for_each(|v| *v = f64::NAN);
        adx[..adx_start].iter_mut().for_each(|v| *v = f64::NAN);

        DmiOutput {
            plus_di,
            minus_di,
            adx,
        }
    }
}
