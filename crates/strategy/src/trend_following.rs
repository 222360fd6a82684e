//! Moving-average / MACD / ADX trend following.
//!
//! Trades only in the direction of a confirmed trend, and asks to flatten a
//! held position once ADX shows the trend has faded.

use std::collections::BTreeMap;

use common::{Candle, Exposure, Result, Signal, SignalType};

use crate::base::{
    override_param, resolve, trailing, winning_side, SignalInput, StrategyCore, StrategyParams,
    StrategyStatus, Tally,
};
use crate::indicators::{self, Indicator, IndicatorFrame, IndicatorSpec};
use crate::params::{ensure, ParamReader, ParamSpec, ParamValue, Params};
use crate::{Strategy, StrategyKind};

/// A side wins above 0.6.
const WIN_THRESHOLD_TENTHS: u32 = 6;
const STRONG_TREND_AMPLIFICATION: f64 = 1.3;
const EXIT_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct TrendFollowingParams {
    pub fast_ma: usize,
    pub slow_ma: usize,
    pub signal_ma: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub trend_confirmation_bars: usize,
    pub lookback: usize,
}

impl StrategyParams for TrendFollowingParams {
    fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("fast_ma", 9, 5, 20, "Fast moving average period"),
            ParamSpec::int("slow_ma", 21, 15, 50, "Slow moving average period"),
            ParamSpec::int("signal_ma", 50, 20, 200, "Trend signal moving average period"),
            ParamSpec::int("macd_fast", 12, 2, 50, "MACD fast EMA span"),
            ParamSpec::int("macd_slow", 26, 5, 100, "MACD slow EMA span"),
            ParamSpec::int("macd_signal", 9, 2, 50, "MACD signal EMA span"),
            ParamSpec::int("adx_period", 14, 5, 50, "ADX period"),
            ParamSpec::float("adx_threshold", 25.0, 15.0, 40.0, "ADX level of a strong trend"),
            ParamSpec::int("atr_period", 14, 5, 50, "ATR period"),
            ParamSpec::float("atr_multiplier", 2.0, 0.5, 5.0, "ATR multiple for the suggested stop"),
            ParamSpec::int("trend_confirmation_bars", 3, 1, 10, "Bars of same-sign trend to confirm"),
            ParamSpec::int("lookback", 100, 100, 1000, "Candles evaluated per signal"),
        ]
    }

    fn read(reader: &ParamReader<'_>) -> Result<Self> {
        let params = Self {
            fast_ma: reader.usize("fast_ma")?,
            slow_ma: reader.usize("slow_ma")?,
            signal_ma: reader.usize("signal_ma")?,
            macd_fast: reader.usize("macd_fast")?,
            macd_slow: reader.usize("macd_slow")?,
            macd_signal: reader.usize("macd_signal")?,
            adx_period: reader.usize("adx_period")?,
            adx_threshold: reader.f64("adx_threshold")?,
            atr_period: reader.usize("atr_period")?,
            atr_multiplier: reader.f64("atr_multiplier")?,
            trend_confirmation_bars: reader.usize("trend_confirmation_bars")?,
            lookback: reader.usize("lookback")?,
        };

        ensure(params.fast_ma < params.slow_ma, "fast_ma", "must be below slow_ma")?;
        ensure(params.macd_fast < params.macd_slow, "macd_fast", "must be below macd_slow")?;
        let needed = params.indicator_spec().min_length() + params.trend_confirmation_bars;
        ensure(
            params.lookback >= needed,
            "lookback",
            format!("must cover indicator warm-up plus confirmation ({needed} candles)"),
        )?;
        Ok(params)
    }
}

impl TrendFollowingParams {
    fn indicator_spec(&self) -> IndicatorSpec {
        IndicatorSpec::default()
            .with(Indicator::Sma {
                period: self.fast_ma,
                column: "ma_fast".into(),
            })
            .with(Indicator::Sma {
                period: self.slow_ma,
                column: "ma_slow".into(),
            })
            .with(Indicator::Sma {
                period: self.signal_ma,
                column: "ma_signal".into(),
            })
            .with(Indicator::Macd {
                fast: self.macd_fast,
                slow: self.macd_slow,
                signal: self.macd_signal,
            })
            .with(Indicator::Dmi {
                period: self.adx_period,
            })
            .with(Indicator::Atr {
                period: self.atr_period,
            })
    }
}

/// Sign of fast MA minus slow MA at `index`; 0 when either is undefined.
fn trend_at(frame: &IndicatorFrame, index: usize) -> i8 {
    match (frame.value_at("ma_fast", index), frame.value_at("ma_slow", index)) {
        (Some(fast), Some(slow)) if fast > slow => 1,
        (Some(fast), Some(slow)) if fast < slow => -1,
        _ => 0,
    }
}

/// +1 / -1 when the trend kept one sign over the last `bars` candles, else 0.
fn confirmed_trend(frame: &IndicatorFrame, bars: usize) -> i8 {
    if bars == 0 || frame.len() < bars {
        return 0;
    }
    let recent: Vec<i8> = (frame.len() - bars..frame.len())
        .map(|i| trend_at(frame, i))
        .collect();
    if recent.iter().all(|&t| t > 0) {
        1
    } else if recent.iter().all(|&t| t < 0) {
        -1
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Reading {
    confirmed: i8,
    ma_fast: Option<f64>,
    ma_slow: Option<f64>,
    ma_signal: Option<f64>,
    macd: Option<f64>,
    macd_signal: Option<f64>,
    hist: Option<f64>,
    prev_hist: Option<f64>,
    adx: Option<f64>,
    plus_di: Option<f64>,
    minus_di: Option<f64>,
    atr: Option<f64>,
}

pub struct TrendFollowingStrategy {
    core: StrategyCore,
    params: TrendFollowingParams,
    spec: IndicatorSpec,
}

impl TrendFollowingStrategy {
    pub fn new(name: impl Into<String>, params: &Params) -> Result<Self> {
        let (base, specific, resolved) = resolve::<TrendFollowingParams>(params)?;
        let spec = specific.indicator_spec();
        Ok(Self {
            core: StrategyCore::new(name, StrategyKind::TrendFollowing, base, resolved),
            params: specific,
            spec,
        })
    }

    pub fn schema() -> Vec<ParamSpec> {
        TrendFollowingParams::full_schema()
    }

    pub fn params(&self) -> &TrendFollowingParams {
        &self.params
    }

    fn read(&self, window: &[Candle]) -> Reading {
        let frame = indicators::compute(window, &self.spec);
        let prev = frame.len().checked_sub(2);
        Reading {
            confirmed: confirmed_trend(&frame, self.params.trend_confirmation_bars),
            ma_fast: frame.last("ma_fast"),
            ma_slow: frame.last("ma_slow"),
            ma_signal: frame.last("ma_signal"),
            macd: frame.last("macd"),
            macd_signal: frame.last("macd_signal"),
            hist: frame.last("macd_hist"),
            prev_hist: prev.and_then(|i| frame.value_at("macd_hist", i)),
            adx: frame.last("adx"),
            plus_di: frame.last("plus_di"),
            minus_di: frame.last("minus_di"),
            atr: frame.last("atr"),
        }
    }

    fn snapshot(&self, r: &Reading) -> BTreeMap<String, f64> {
        let stop_distance = r.atr.map(|atr| atr * self.params.atr_multiplier);
        [
            ("ma_fast", r.ma_fast),
            ("ma_slow", r.ma_slow),
            ("ma_signal", r.ma_signal),
            ("macd", r.macd),
            ("macd_signal", r.macd_signal),
            ("macd_hist", r.hist),
            ("adx", r.adx),
            ("plus_di", r.plus_di),
            ("minus_di", r.minus_di),
            ("atr", r.atr),
            ("stop_distance", stop_distance),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect()
    }

    fn strong_trend(&self, r: &Reading) -> bool {
        r.adx.is_some_and(|adx| adx > self.params.adx_threshold)
    }

    fn tally(&self, r: &Reading) -> (Tally, Tally) {
        let p = &self.params;
        let strong = self.strong_trend(r);
        let mut buy = Tally::default();
        let mut sell = Tally::default();

        if r.confirmed > 0 {
            buy.add(3, "Confirmed uptrend");
            if strong {
                buy.add(2, format!("Strong trend (ADX: {:.1})", r.adx.unwrap_or_default()));
            }
            if let (Some(fast), Some(slow)) = (r.ma_fast, r.ma_slow) {
                if fast > slow {
                    buy.add(2, format!("MA{} > MA{}", p.fast_ma, p.slow_ma));
                }
            }
            if let (Some(macd), Some(signal)) = (r.macd, r.macd_signal) {
                if macd > signal {
                    buy.add(2, "MACD > Signal");
                }
            }
            if let (Some(hist), Some(prev)) = (r.hist, r.prev_hist) {
                if hist > 0.0 && hist > prev {
                    buy.add(1, "MACD histogram rising");
                }
            }
            if let (Some(plus), Some(minus)) = (r.plus_di, r.minus_di) {
                if plus > minus {
                    buy.add(1, format!("+DI > -DI ({plus:.1} > {minus:.1})"));
                }
            }
        }

        if r.confirmed < 0 {
            sell.add(3, "Confirmed downtrend");
            if strong {
                sell.add(2, format!("Strong trend (ADX: {:.1})", r.adx.unwrap_or_default()));
            }
            if let (Some(fast), Some(slow)) = (r.ma_fast, r.ma_slow) {
                if fast < slow {
                    sell.add(2, format!("MA{} < MA{}", p.fast_ma, p.slow_ma));
                }
            }
            if let (Some(macd), Some(signal)) = (r.macd, r.macd_signal) {
                if macd < signal {
                    sell.add(2, "MACD < Signal");
                }
            }
            if let (Some(hist), Some(prev)) = (r.hist, r.prev_hist) {
                if hist < 0.0 && hist < prev {
                    sell.add(1, "MACD histogram falling");
                }
            }
            if let (Some(plus), Some(minus)) = (r.plus_di, r.minus_di) {
                if minus > plus {
                    sell.add(1, format!("-DI > +DI ({minus:.1} > {plus:.1})"));
                }
            }
        }

        (buy, sell)
    }
}

impl Strategy for TrendFollowingStrategy {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::TrendFollowing
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
        let strong = self.strong_trend(&reading);

        let (kind, strength, confidence, rationale) =
            match winning_side(&buy, &sell, WIN_THRESHOLD_TENTHS) {
                Some(SignalType::Buy) => {
                    let mut strength = buy.weight().min(1.0);
                    if strong {
                        strength = (strength * STRONG_TREND_AMPLIFICATION).min(1.0);
                    }
                    (SignalType::Buy, strength, buy.weight(), buy.rationale())
                }
                Some(_) => {
                    let mut strength = -sell.weight().min(1.0);
                    if strong {
                        strength = (strength * STRONG_TREND_AMPLIFICATION).max(-1.0);
                    }
                    (SignalType::Sell, strength, sell.weight(), sell.rationale())
                }
                None => {
                    let fading = reading
                        .adx
                        .filter(|&adx| adx < self.params.adx_threshold / 2.0);
                    match fading {
                        Some(adx) if self.core.position() != Exposure::Flat => (
                            SignalType::Exit,
                            0.0,
                            EXIT_CONFIDENCE,
                            format!("Trend weakening (ADX: {adx:.1})"),
                        ),
                        _ => (
                            SignalType::Hold,
                            0.0,
                            buy.weight().max(sell.weight()) / 2.0,
                            "Trend undefined or weak".to_string(),
                        ),
                    }
                }
            };

        let signal = Signal::new(
            kind,
            strength,
            confidence,
            input.current_price,
            input.at,
            input.symbol,
            self.snapshot(&reading),
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
            override_param::<TrendFollowingParams>(self.core.parameters(), name, value)?;
        self.spec = specific.indicator_spec();
        self.params = specific;
        self.core.reconfigure(base, resolved);
        Ok(())
    }
}
