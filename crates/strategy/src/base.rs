//! State and parameters shared by every strategy implementation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use common::{Candle, Exposure, MarketSnapshot, Result, Signal, SignalType};

use crate::params::{ParamReader, ParamSpec, ParamValue, Params};
use crate::StrategyKind;

/// Everything a strategy needs for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct SignalInput<'a> {
    pub symbol: &'a str,
    /// Latest trade or mid price at call time.
    pub current_price: f64,
    pub market: Option<&'a MarketSnapshot>,
    /// Time-ordered candle window. When absent the strategy uses the history
    /// it was given through `initialize`/`update`.
    pub history: Option<&'a [Candle]>,
    /// Symbol → held quantity, as reported by the caller.
    pub positions: Option<&'a HashMap<String, f64>>,
    /// Timestamp stamped on the produced signal.
    pub at: DateTime<Utc>,
}

impl<'a> SignalInput<'a> {
    pub fn new(symbol: &'a str, current_price: f64) -> Self {
        Self {
            symbol,
            current_price,
            market: None,
            history: None,
            positions: None,
            at: Utc::now(),
        }
    }

    pub fn with_history(mut self, history: &'a [Candle]) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_market(mut self, market: &'a MarketSnapshot) -> Self {
        self.market = Some(market);
        self
    }

    pub fn with_positions(mut self, positions: &'a HashMap<String, f64>) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Snapshot returned by `Strategy::get_status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyStatus {
    pub name: String,
    pub kind: StrategyKind,
    pub position: Exposure,
    pub signals_generated: u64,
    pub last_signal: Option<Signal>,
    pub parameters: Params,
    pub enabled: bool,
    /// False while a model-based strategy has no usable trained model.
    pub ready: bool,
}

/// Risk and scheduling parameters every strategy carries. They are advisory
/// for signal consumers; only `enabled` changes engine behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseParams {
    pub enabled: bool,
    pub timeframe: String,
    pub max_position: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing_stop_pct: f64,
}

impl BaseParams {
    pub fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::boolean("enabled", true, "Whether the runner evaluates this strategy"),
            ParamSpec::text("timeframe", "1h", "Candle interval the strategy is tuned for"),
            ParamSpec::float("max_position", 1.0, 0.0, 100.0, "Maximum position size"),
            ParamSpec::float("stop_loss_pct", 2.0, 0.0, 100.0, "Suggested stop loss (%)"),
            ParamSpec::float("take_profit_pct", 4.0, 0.0, 100.0, "Suggested take profit (%)"),
            ParamSpec::float("trailing_stop_pct", 1.5, 0.0, 100.0, "Suggested trailing stop (%)"),
        ]
    }

    pub fn read(reader: &ParamReader<'_>) -> Result<Self> {
        Ok(Self {
            enabled: reader.bool("enabled")?,
            timeframe: reader.string("timeframe")?,
            max_position: reader.f64("max_position")?,
            stop_loss_pct: reader.f64("stop_loss_pct")?,
            take_profit_pct: reader.f64("take_profit_pct")?,
            trailing_stop_pct: reader.f64("trailing_stop_pct")?,
        })
    }
}

/// Strategy-specific parameter set.
pub trait StrategyParams: Sized {
    /// Parameters specific to this strategy (base parameters are added).
    fn schema() -> Vec<ParamSpec>;

    /// Read and cross-validate the parameters.
    fn read(reader: &ParamReader<'_>) -> Result<Self>;

    fn full_schema() -> Vec<ParamSpec> {
        let mut schema = BaseParams::schema();
        schema.extend(Self::schema());
        schema
    }
}

/// Validate `params` into (base params, strategy params, effective map).
pub fn resolve<P: StrategyParams>(params: &Params) -> Result<(BaseParams, P, Params)> {
    let reader = ParamReader::new(params, P::full_schema());
    let base = BaseParams::read(&reader)?;
    let specific = P::read(&reader)?;
    let resolved = reader.resolved()?;
    Ok((base, specific, resolved))
}

/// Re-validate the effective parameters with one value replaced.
pub fn override_param<P: StrategyParams>(
    current: &Params,
    name: &str,
    value: ParamValue,
) -> Result<(BaseParams, P, Params)> {
    if !P::full_schema().iter().any(|s| s.name == name) {
        return Err(common::Error::invalid_parameter(name, "unknown parameter"));
    }
    let mut next = current.clone();
    next.insert(name.to_string(), value);
    resolve::<P>(&next)
}

/// Mutable bookkeeping common to all strategies: identity, position belief,
/// last signal, counters and stored history.
#[derive(Debug, Clone)]
pub struct StrategyCore {
    name: String,
    kind: StrategyKind,
    base: BaseParams,
    parameters: Params,
    position: Exposure,
    last_signal: Option<Signal>,
    signals_generated: u64,
    history: Vec<Candle>,
    history_cap: usize,
}

impl StrategyCore {
    /// Smallest cap on the stored history.
    pub const DEFAULT_HISTORY_CAP: usize = 1000;

    pub fn new(name: impl Into<String>, kind: StrategyKind, base: BaseParams, parameters: Params) -> Self {
        Self {
            name: name.into(),
            kind,
            base,
            parameters,
            position: Exposure::Flat,
            last_signal: None,
            signals_generated: 0,
            history: Vec::new(),
            history_cap: Self::DEFAULT_HISTORY_CAP,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn base(&self) -> &BaseParams {
        &self.base
    }

    pub fn parameters(&self) -> &Params {
        &self.parameters
    }

    pub fn position(&self) -> Exposure {
        self.position
    }

    pub fn history(&self) -> &[Candle] {
        &self.history
    }

    /// Keep at most `cap` stored candles (never fewer than the default cap).
    pub fn set_history_cap(&mut self, cap: usize) {
        self.history_cap = cap.max(Self::DEFAULT_HISTORY_CAP);
        self.trim_history();
    }

    fn trim_history(&mut self) {
        let excess = self.history.len().saturating_sub(self.history_cap);
        if excess > 0 {
            self.history.drain(..excess);
        }
    }

    pub fn reconfigure(&mut self, base: BaseParams, parameters: Params) {
        self.base = base;
        self.parameters = parameters;
    }

    pub fn initialize(&mut self, series: &[Candle]) {
        let start = series.len().saturating_sub(self.history_cap);
        self.history = series[start..].to_vec();
        debug!(strategy = %self.name, candles = self.history.len(), "Strategy initialized with history");
    }

    /// Append candles newer than the stored tail; stale or duplicate
    /// open-times are skipped.
    pub fn update(&mut self, candles: &[Candle]) {
        for candle in candles {
            if let Some(last) = self.history.last() {
                if candle.open_time <= last.open_time {
                    warn!(
                        strategy = %self.name,
                        open_time = %candle.open_time,
                        last = %last.open_time,
                        "Skipping out-of-order candle"
                    );
                    continue;
                }
            }
            self.history.push(candle.clone());
        }
        self.trim_history();
    }

    /// Record a freshly produced signal and hand it back to the caller.
    pub fn record(&mut self, signal: Signal) -> Signal {
        self.position = self.position.after(signal.kind);
        self.signals_generated += 1;
        self.last_signal = Some(signal.clone());
        debug!(
            strategy = %self.name,
            symbol = %signal.symbol,
            kind = %signal.kind,
            strength = signal.strength,
            confidence = signal.confidence,
            "Signal generated"
        );
        signal
    }

    pub fn status(&self, ready: bool) -> StrategyStatus {
        StrategyStatus {
            name: self.name.clone(),
            kind: self.kind,
            position: self.position,
            signals_generated: self.signals_generated,
            last_signal: self.last_signal.clone(),
            parameters: self.parameters.clone(),
            enabled: self.base.enabled,
            ready,
        }
    }
}

/// Weighted conditions for one side of a decision. Weights are kept in
/// integer tenths so threshold comparisons are exact.
#[derive(Debug, Default, Clone)]
pub(crate) struct Tally {
    tenths: u32,
    reasons: Vec<String>,
}

impl Tally {
    pub fn add(&mut self, tenths: u32, reason: impl Into<String>) {
        self.tenths += tenths;
        self.reasons.push(reason.into());
    }

    pub fn tenths(&self) -> u32 {
        self.tenths
    }

    pub fn weight(&self) -> f64 {
        f64::from(self.tenths) / 10.0
    }

    pub fn rationale(&self) -> String {
        self.reasons.join(" | ")
    }
}

/// Side that clears `threshold` tenths and strictly outweighs the other.
pub(crate) fn winning_side(buy: &Tally, sell: &Tally, threshold: u32) -> Option<SignalType> {
    if buy.tenths() > threshold && buy.tenths() > sell.tenths() {
        Some(SignalType::Buy)
    } else if sell.tenths() > threshold && sell.tenths() > buy.tenths() {
        Some(SignalType::Sell)
    } else {
        None
    }
}

/// The trailing `lookback` candles of `series`, or `None` below `min` candles.
pub(crate) fn trailing(series: &[Candle], min: usize, lookback: usize) -> Option<&[Candle]> {
    if series.len() < min.max(1) {
        return None;
    }
    Some(&series[series.len().saturating_sub(lookback)..])
}
