//! Bollinger / RSI mean reversion: trade the extremes of a rolling range.

use std::collections::BTreeMap;

use common::{Candle, Result, Signal, SignalType};

use crate::base::{
    override_param, resolve, trailing, winning_side, SignalInput, StrategyCore, StrategyParams,
    StrategyStatus, Tally,
};
use crate::indicators::{self, Indicator, IndicatorSpec};
use crate::params::{ensure, ParamReader, ParamSpec, ParamValue, Params};
use crate::{Strategy, StrategyKind};

/// Candles scanned for recent band touches.
const TOUCH_WINDOW: usize = 10;
/// A side wins above 0.5.
const WIN_THRESHOLD_TENTHS: u32 = 5;
/// Price this far (in %) beyond a band amplifies the strength.
const FAR_BEYOND_BAND_PCT: f64 = 5.0;
const AMPLIFICATION: f64 = 1.2;

#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversionParams {
    pub bb_period: usize,
    pub bb_std: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub volume_threshold: f64,
    pub min_touch_bands: usize,
    pub volume_period: usize,
    pub lookback: usize,
}

impl StrategyParams for MeanReversionParams {
    fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("bb_period", 20, 10, 50, "Bollinger Bands period"),
            ParamSpec::float("bb_std", 2.0, 1.0, 3.0, "Bollinger Bands standard deviation multiplier"),
            ParamSpec::int("rsi_period", 14, 7, 21, "RSI period"),
            ParamSpec::float("rsi_oversold", 30.0, 5.0, 50.0, "RSI oversold threshold"),
            ParamSpec::float("rsi_overbought", 70.0, 50.0, 95.0, "RSI overbought threshold"),
            ParamSpec::float("volume_threshold", 1.5, 1.0, 10.0, "Volume ratio considered elevated"),
            ParamSpec::int("min_touch_bands", 2, 1, 10, "Band touches within the last 10 candles"),
            ParamSpec::int("volume_period", 20, 5, 100, "Volume average period"),
            ParamSpec::int("lookback", 50, 20, 500, "Candles evaluated per signal"),
        ]
    }

    fn read(reader: &ParamReader<'_>) -> Result<Self> {
        let params = Self {
            bb_period: reader.usize("bb_period")?,
            bb_std: reader.f64("bb_std")?,
            rsi_period: reader.usize("rsi_period")?,
            rsi_oversold: reader.f64("rsi_oversold")?,
            rsi_overbought: reader.f64("rsi_overbought")?,
            volume_threshold: reader.f64("volume_threshold")?,
            min_touch_bands: reader.usize("min_touch_bands")?,
            volume_period: reader.usize("volume_period")?,
            lookback: reader.usize("lookback")?,
        };

        ensure(
            params.rsi_oversold < params.rsi_overbought,
            "rsi_oversold",
            "must be below rsi_overbought",
        )?;
        ensure(
            params.lookback >= params.indicator_spec().min_length(),
            "lookback",
            format!(
                "must cover the longest indicator warm-up ({} candles)",
                params.indicator_spec().min_length()
            ),
        )?;
        Ok(params)
    }
}

impl MeanReversionParams {
    fn indicator_spec(&self) -> IndicatorSpec {
        IndicatorSpec::default()
            .with(Indicator::Bollinger {
                period: self.bb_period,
                std_dev: self.bb_std,
            })
            .with(Indicator::Rsi {
                period: self.rsi_period,
            })
            .with(Indicator::VolumeRatio {
                period: self.volume_period,
            })
    }
}

/// Latest indicator readings the decision is based on.
#[derive(Debug, Clone, Copy)]
struct Reading {
    rsi: Option<f64>,
    dist_lower: Option<f64>,
    dist_upper: Option<f64>,
    volume_ratio: Option<f64>,
    width: Option<f64>,
    touches_lower: usize,
    touches_upper: usize,
}

impl Reading {
    fn snapshot(&self) -> BTreeMap<String, f64> {
        [
            ("rsi", self.rsi),
            ("bb_dist_lower", self.dist_lower),
            ("bb_dist_upper", self.dist_upper),
            ("volume_ratio", self.volume_ratio),
            ("bb_width", self.width),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect()
    }
}

pub struct MeanReversionStrategy {
    core: StrategyCore,
    params: MeanReversionParams,
    spec: IndicatorSpec,
}

impl MeanReversionStrategy {
    pub fn new(name: impl Into<String>, params: &Params) -> Result<Self> {
        let (base, specific, resolved) = resolve::<MeanReversionParams>(params)?;
        let spec = specific.indicator_spec();
        Ok(Self {
            core: StrategyCore::new(name, StrategyKind::MeanReversion, base, resolved),
            params: specific,
            spec,
        })
    }

    pub fn schema() -> Vec<ParamSpec> {
        MeanReversionParams::full_schema()
    }

    pub fn params(&self) -> &MeanReversionParams {
        &self.params
    }

    fn read(&self, window: &[Candle]) -> Reading {
        let frame = indicators::compute(window, &self.spec);
        let touches = |name: &str| {
            frame
                .tail(name, TOUCH_WINDOW)
                .iter()
                .filter(|&&v| v == 1.0)
                .count()
        };
        Reading {
            rsi: frame.last("rsi"),
            dist_lower: frame.last("bb_dist_lower"),
            dist_upper: frame.last("bb_dist_upper"),
            volume_ratio: frame.last("volume_ratio"),
            width: frame.last("bb_width"),
            touches_lower: touches("bb_touch_lower"),
            touches_upper: touches("bb_touch_upper"),
        }
    }

    fn tally(&self, r: &Reading) -> (Tally, Tally) {
        let p = &self.params;
        let mut buy = Tally::default();
        let mut sell = Tally::default();
        let high_volume = r.volume_ratio.filter(|&v| v > p.volume_threshold);

        if let Some(d) = r.dist_lower.filter(|&d| d < 0.0) {
            buy.add(3, format!("Price {:.1}% below lower band", d.abs()));
        }
        if let Some(rsi) = r.rsi.filter(|&v| v < p.rsi_oversold) {
            buy.add(3, format!("RSI oversold ({rsi:.1})"));
        }
        if let Some(v) = high_volume {
            buy.add(2, format!("Volume {v:.1}x above average"));
        }
        if r.touches_lower >= p.min_touch_bands {
            buy.add(2, format!("{} recent lower band touches", r.touches_lower));
        }

        if let Some(d) = r.dist_upper.filter(|&d| d > 0.0) {
            sell.add(3, format!("Price {d:.1}% above upper band"));
        }
        if let Some(rsi) = r.rsi.filter(|&v| v > p.rsi_overbought) {
            sell.add(3, format!("RSI overbought ({rsi:.1})"));
        }
        if let Some(v) = high_volume {
            sell.add(2, format!("Volume {v:.1}x above average"));
        }
        if r.touches_upper >= p.min_touch_bands {
            sell.add(2, format!("{} recent upper band touches", r.touches_upper));
        }

        (buy, sell)
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn min_history(&self) -> usize {
        self.params.lookback
    }

    fn initialize(&mut self, series: &[Candle]) {
        self.core.initialize(series);
    }

    fn update(&mut self, candles: &[Candle]) {
        self.core.update(candles);
    }

    fn generate_signal(&mut self, input: &SignalInput<'_>) -> Option<Signal> {
        let series = input.history.unwrap_or_else(|| self.core.history());
        let window = trailing(series, self.min_history(), self.params.lookback)?;
        let reading = self.read(window);
        let (buy, sell) = self.tally(&reading);

        let (kind, strength, confidence, rationale) =
            match winning_side(&buy, &sell, WIN_THRESHOLD_TENTHS) {
                Some(SignalType::Buy) => {
                    let mut strength = buy.weight().min(1.0);
                    if reading.dist_lower.is_some_and(|d| d < -FAR_BEYOND_BAND_PCT) {
                        strength = (strength * AMPLIFICATION).min(1.0);
                    }
                    (SignalType::Buy, strength, buy.weight(), buy.rationale())
                }
                Some(_) => {
                    let mut strength = -sell.weight().min(1.0);
                    if reading.dist_upper.is_some_and(|d| d > FAR_BEYOND_BAND_PCT) {
                        strength = (strength * AMPLIFICATION).max(-1.0);
                    }
                    (SignalType::Sell, strength, sell.weight(), sell.rationale())
                }
                None => (
                    SignalType::Hold,
                    0.0,
                    buy.weight().max(sell.weight()) / 2.0,
                    "Inconclusive conditions".to_string(),
                ),
            };

        let signal = Signal::new(
            kind,
            strength,
            confidence,
            input.current_price,
            input.at,
            input.symbol,
            reading.snapshot(),
            rationale,
        );
        Some(self.core.record(signal))
    }

    fn get_status(&self) -> StrategyStatus {
        self.core.status(true)
    }

    fn is_enabled(&self) -> bool {
        self.core.base().enabled
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let (base, specific, resolved) =
            override_param::<MeanReversionParams>(self.core.parameters(), name, value)?;
        self.spec = specific.indicator_spec();
        self.params = specific;
        self.core.reconfigure(base, resolved);
        Ok(())
    }
}
