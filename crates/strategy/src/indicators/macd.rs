use super::ema::ema;

/// MACD (Moving Average Convergence/Divergence).
///
/// MACD line = EMA(fast) − EMA(slow), signal = EMA(macd, signal_period),
/// histogram = macd − signal. The EMAs run from the first candle; values are
/// reported as undefined until the slow EMA (and then the signal EMA) has had
/// a full period of input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self { fast, slow, signal }
    }

    /// Index of the first defined MACD line value.
    pub fn line_warmup(&self) -> usize {
        self.slow.saturating_sub(1)
    }

    /// Index of the first defined signal/histogram value.
    pub fn signal_warmup(&self) -> usize {
        (self.slow + self.signal).saturating_sub(2)
    }

    pub fn compute(&self, closes: &[f64]) -> MacdOutput {
        let fast = ema(closes, self.fast);
        let slow = ema(closes, self.slow);
        let mut macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let mut signal = ema(&macd, self.signal);
        let mut histogram: Vec<f64> = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

        mask_before(&mut macd, self.line_warmup());
        mask_before(&mut signal, self.signal_warmup());
        mask_before(&mut histogram, self.signal_warmup());

        MacdOutput {
            macd,
            signal,
            histogram,
        }
    }
}

fn mask_before(values: &mut [f64], index: usize) {
    let end = index.min(values.len());
    values[..end].iter_mut().for_each(|v| *v = f64::NAN);
}
