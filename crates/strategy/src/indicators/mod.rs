//! Technical indicators over a candle window.
//!
//! All computations are pure functions of their input: they read only the
//! window they are given, never look ahead (index `i` depends on candles
//! `..=i`), and mark warm-up positions as undefined (`NaN`) instead of failing.

pub mod atr;
pub mod bollinger;
pub mod dmi;
pub mod ema;
pub mod macd;
pub mod returns;
pub mod rsi;
pub mod sma;
pub mod volume;

use std::collections::BTreeMap;

use common::Candle;

pub use atr::{atr, true_range};
pub use bollinger::{BollingerBands, BollingerOutput};
pub use dmi::{Dmi, DmiOutput};
pub use ema::{ema, wilder};
pub use macd::{Macd, MacdOutput};
pub use rsi::rsi;
pub use sma::{rolling_std, sma};
pub use volume::volume_ratio;

/// One indicator request and the columns it produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Indicator {
    /// SMA of the close, stored under `column`.
    Sma { period: usize, column: String },
    /// `bb_middle`, `bb_std`, `bb_upper`, `bb_lower`, `bb_width`,
    /// `bb_dist_upper`, `bb_dist_lower`, `bb_touch_upper`, `bb_touch_lower`.
    Bollinger { period: usize, std_dev: f64 },
    /// `rsi`.
    Rsi { period: usize },
    /// `macd`, `macd_signal`, `macd_hist`.
    Macd { fast: usize, slow: usize, signal: usize },
    /// `plus_di`, `minus_di`, `adx`.
    Dmi { period: usize },
    /// `tr`, `atr`.
    Atr { period: usize },
    /// `volume_sma`, `volume_ratio`.
    VolumeRatio { period: usize },
    /// `returns`, `log_returns`, `volatility`.
    Returns { volatility_period: usize },
    /// `price_position`.
    PricePosition { period: usize },
    /// `returns_lag_{k}` and `volume_lag_{k}` for every k.
    Lags { lags: Vec<usize> },
}

impl Indicator {
    /// Candles needed before the indicator produces its first defined value.
    pub fn warmup(&self) -> usize {
        match self {
            Indicator::Sma { period, .. } => *period,
            Indicator::Bollinger { period, .. } => *period,
            Indicator::Rsi { period } => period + 1,
            Indicator::Macd { slow, signal, .. } => (slow + signal).saturating_sub(1),
            Indicator::Dmi { period } => 2 * period,
            Indicator::Atr { period } => period + 1,
            Indicator::VolumeRatio { period } => *period,
            Indicator::Returns { volatility_period } => volatility_period + 1,
            Indicator::PricePosition { period } => *period,
            Indicator::Lags { lags } => lags.iter().max().map_or(0, |l| l + 2),
        }
    }

    fn apply(&self, frame: &mut IndicatorFrame) {
        let close = frame.raw("close");
        match self {
            Indicator::Sma { period, column } => {
                frame.insert(column.clone(), sma(&close, *period));
            }
            Indicator::Bollinger { period, std_dev } => {
                let out = BollingerBands::new(*period, *std_dev).compute(&close);
                frame.insert("bb_middle", out.middle);
                frame.insert("bb_std", out.std);
                frame.insert("bb_upper", out.upper);
                frame.insert("bb_lower", out.lower);
                frame.insert("bb_width", out.width);
                frame.insert("bb_dist_upper", out.dist_upper);
                frame.insert("bb_dist_lower", out.dist_lower);
                frame.insert("bb_touch_upper", out.touch_upper);
                frame.insert("bb_touch_lower", out.touch_lower);
            }
            Indicator::Rsi { period } => {
                frame.insert("rsi", rsi(&close, *period));
            }
            Indicator::Macd { fast, slow, signal } => {
                let out = Macd::new(*fast, *slow, *signal).compute(&close);
                frame.insert("macd", out.macd);
                frame.insert("macd_signal", out.signal);
                frame.insert("macd_hist", out.histogram);
            }
            Indicator::Dmi { period } => {
                let out = Dmi::new(*period).compute(&frame.raw("high"), &frame.raw("low"), &close);
                frame.insert("plus_di", out.plus_di);
                frame.insert("minus_di", out.minus_di);
                frame.insert("adx", out.adx);
            }
            Indicator::Atr { period } => {
                let (high, low) = (frame.raw("high"), frame.raw("low"));
                frame.insert("tr", true_range(&high, &low, &close));
                frame.insert("atr", atr(&high, &low, &close, *period));
            }
            Indicator::VolumeRatio { period } => {
                let volume = frame.raw("volume");
                frame.insert("volume_sma", sma(&volume, *period));
                frame.insert("volume_ratio", volume_ratio(&volume, *period));
            }
            Indicator::Returns { volatility_period } => {
                frame.insert("returns", returns::pct_change(&close));
                frame.insert("log_returns", returns::log_returns(&close));
                frame.insert("volatility", returns::volatility(&close, *volatility_period));
            }
            Indicator::PricePosition { period } => {
                let out =
                    returns::price_position(&frame.raw("high"), &frame.raw("low"), &close, *period);
                frame.insert("price_position", out);
            }
            Indicator::Lags { lags } => {
                let rets = returns::pct_change(&close);
                let volume = frame.raw("volume");
                for &k in lags {
                    frame.insert(format!("returns_lag_{k}"), returns::lag(&rets, k));
                    frame.insert(format!("volume_lag_{k}"), returns::lag(&volume, k));
                }
            }
        }
    }
}

/// The set of indicators to compute for one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSpec {
    pub indicators: Vec<Indicator>,
}

impl IndicatorSpec {
    pub fn new(indicators: Vec<Indicator>) -> Self {
        Self { indicators }
    }

    pub fn with(mut self, indicator: Indicator) -> Self {
        self.indicators.push(indicator);
        self
    }

    /// Window length needed for every requested indicator to be defined on the
    /// last candle.
    pub fn min_length(&self) -> usize {
        self.indicators.iter().map(Indicator::warmup).max().unwrap_or(0)
    }
}

/// Named numeric columns aligned with a candle window.
///
/// Always holds `open`, `high`, `low`, `close` and `volume`. Undefined values
/// are stored as `NaN` and come back as `None` from the accessors.
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    len: usize,
    columns: BTreeMap<String, Vec<f64>>,
}

impl IndicatorFrame {
    pub fn from_candles(window: &[Candle]) -> Self {
        let mut frame = Self {
            len: window.len(),
            columns: BTreeMap::new(),
        };
        frame.insert("open", window.iter().map(|c| c.open).collect());
        frame.insert("high", window.iter().map(|c| c.high).collect());
        frame.insert("low", window.iter().map(|c| c.low).collect());
        frame.insert("close", window.iter().map(|c| c.close).collect());
        frame.insert("volume", window.iter().map(|c| c.volume).collect());
        frame
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Defined value of `name` at `index`.
    pub fn value_at(&self, name: &str, index: usize) -> Option<f64> {
        self.column(name)
            .and_then(|c| c.get(index).copied())
            .filter(|v| v.is_finite())
    }

    /// Defined value of `name` on the last candle.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.len.checked_sub(1).and_then(|i| self.value_at(name, i))
    }

    /// Last `n` raw values of `name` (undefined values included as `NaN`).
    pub fn tail(&self, name: &str, n: usize) -> &[f64] {
        self.column(name)
            .map(|c| &c[c.len().saturating_sub(n)..])
            .unwrap_or(&[])
    }

    /// Add or replace a column. Columns must match the frame length.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.len, "indicator column length mismatch");
        self.columns.insert(name.into(), values);
    }

    fn raw(&self, name: &str) -> Vec<f64> {
        self.column(name)
            .map(<[f64]>::to_vec)
            .unwrap_or_else(|| vec![f64::NAN; self.len])
    }
}

/// Compute every indicator in `spec` over `window`.
///
/// Windows shorter than `spec.min_length()` are fine: the affected positions
/// stay undefined.
pub fn compute(window: &[Candle], spec: &IndicatorSpec) -> IndicatorFrame {
    let mut frame = IndicatorFrame::from_candles(window);
    for indicator in &spec.indicators {
        indicator.apply(&mut frame);
    }
    frame
}
