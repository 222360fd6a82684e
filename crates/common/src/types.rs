use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One closed OHLCV bar.
///
/// A series of candles for a (symbol, interval) pair is ordered by `open_time`
/// ascending with no duplicate open-times. The engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub quote_volume: f64,
    #[serde(default)]
    pub trades: u64,
}

/// Live ticker snapshot supplied by the market-data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub bid_price: f64,
    pub ask_price: f64,
    pub last_price: f64,
    pub volume_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub price_change_percent_24h: f64,
}

impl MarketSnapshot {
    pub fn spread(&self) -> f64 {
        self.ask_price - self.bid_price
    }

    pub fn mid_price(&self) -> f64 {
        (self.ask_price + self.bid_price) / 2.0
    }
}

/// Market data event fed to the signal runner.
/// Only events with `is_candle_closed == true` extend the candle history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub symbol: String,
    /// Latest trade price at the time of the event.
    pub price: f64,
    pub candle: Candle,
    pub is_candle_closed: bool,
}

/// Direction of a strategy signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
    Exit,
}

impl SignalType {
    /// Buy, Sell and Exit ask the consumer to act; Hold does not.
    pub fn is_actionable(self) -> bool {
        !matches!(self, SignalType::Hold)
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
            SignalType::Hold => write!(f, "HOLD"),
            SignalType::Exit => write!(f, "EXIT"),
        }
    }
}

/// Advisory output of a strategy evaluation.
///
/// Built only through [`Signal::new`], which keeps `strength` consistent with
/// `kind`, bounds both scores, and drops undefined indicator values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub kind: SignalType,
    /// -1.0 (sell-weighted) ..= 1.0 (buy-weighted).
    pub strength: f64,
    /// 0.0 ..= 1.0.
    pub confidence: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    /// Indicator values the decision was based on.
    pub indicators: BTreeMap<String, f64>,
    pub rationale: String,
}

impl Signal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: SignalType,
        strength: f64,
        confidence: f64,
        price: f64,
        timestamp: DateTime<Utc>,
        symbol: impl Into<String>,
        indicators: BTreeMap<String, f64>,
        rationale: impl Into<String>,
    ) -> Self {
        let strength = if strength.is_finite() { strength } else { 0.0 };
        let strength = match kind {
            SignalType::Buy => strength.clamp(0.0, 1.0),
            SignalType::Sell => strength.clamp(-1.0, 0.0),
            SignalType::Hold | SignalType::Exit => 0.0,
        };
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let indicators = indicators
            .into_iter()
            .filter(|(_, v)| v.is_finite())
            .collect();

        Self {
            kind,
            strength,
            confidence,
            price,
            timestamp,
            symbol: symbol.into(),
            indicators,
            rationale: rationale.into(),
        }
    }
}

/// The exposure a strategy believes it holds. Never checked against an exchange.
///
/// Serialized as -1 (short), 0 (flat) or 1 (long).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Exposure {
    Short,
    #[default]
    Flat,
    Long,
}

impl Exposure {
    pub fn as_i8(self) -> i8 {
        match self {
            Exposure::Short => -1,
            Exposure::Flat => 0,
            Exposure::Long => 1,
        }
    }

    /// Exposure after acting on a signal of the given type.
    pub fn after(self, kind: SignalType) -> Self {
        match kind {
            SignalType::Buy => Exposure::Long,
            SignalType::Sell => Exposure::Short,
            SignalType::Exit => Exposure::Flat,
            SignalType::Hold => self,
        }
    }
}

impl From<Exposure> for i8 {
    fn from(exposure: Exposure) -> Self {
        exposure.as_i8()
    }
}

impl TryFrom<i8> for Exposure {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Exposure::Short),
            0 => Ok(Exposure::Flat),
            1 => Ok(Exposure::Long),
            other => Err(format!("exposure must be -1, 0 or 1, got {other}")),
        }
    }
}

impl std::fmt::Display for Exposure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

/// Current state of the signal runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
            EngineState::Paused => write!(f, "paused"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(kind: SignalType, strength: f64, confidence: f64) -> Signal {
        Signal::new(
            kind,
            strength,
            confidence,
            100.0,
            Utc::now(),
            "BTCUSDT",
            BTreeMap::new(),
            "",
        )
    }

    #[test]
    fn strength_follows_signal_type() {
        assert_eq!(build(SignalType::Buy, -0.4, 0.5).strength, 0.0);
        assert_eq!(build(SignalType::Sell, 0.4, 0.5).strength, 0.0);
        assert_eq!(build(SignalType::Hold, 0.9, 0.5).strength, 0.0);
        assert_eq!(build(SignalType::Exit, -0.9, 0.7).strength, 0.0);
        assert_eq!(build(SignalType::Buy, 1.56, 0.5).strength, 1.0);
        assert_eq!(build(SignalType::Sell, -1.3, 0.5).strength, -1.0);
    }

    #[test]
    fn confidence_is_bounded_and_finite() {
        assert_eq!(build(SignalType::Buy, 0.5, 1.4).confidence, 1.0);
        assert_eq!(build(SignalType::Buy, 0.5, -0.1).confidence, 0.0);
        assert_eq!(build(SignalType::Buy, 0.5, f64::NAN).confidence, 0.0);
    }

    #[test]
    fn undefined_indicator_values_are_dropped() {
        let mut indicators = BTreeMap::new();
        indicators.insert("rsi".to_string(), 55.0);
        indicators.insert("adx".to_string(), f64::NAN);
        indicators.insert("ratio".to_string(), f64::INFINITY);
        let signal = Signal::new(
            SignalType::Hold,
            0.0,
            0.1,
            1.0,
            Utc::now(),
            "ETHUSDT",
            indicators,
            "x",
        );
        assert_eq!(signal.indicators.len(), 1);
        assert_eq!(signal.indicators["rsi"], 55.0);
    }

    #[test]
    fn exposure_transitions() {
        assert_eq!(Exposure::Flat.after(SignalType::Buy), Exposure::Long);
        assert_eq!(Exposure::Long.after(SignalType::Hold), Exposure::Long);
        assert_eq!(Exposure::Long.after(SignalType::Exit), Exposure::Flat);
        assert_eq!(Exposure::Flat.after(SignalType::Sell), Exposure::Short);
        assert_eq!(Exposure::Short.as_i8(), -1);
    }

    #[test]
    fn exposure_serializes_as_signed_unit() {
        assert_eq!(serde_json::to_value(Exposure::Short).unwrap(), -1);
        assert_eq!(serde_json::to_value(Exposure::Long).unwrap(), 1);
        let flat: Exposure = serde_json::from_str("0").unwrap();
        assert_eq!(flat, Exposure::Flat);
        assert!(serde_json::from_str::<Exposure>("2").is_err());
    }

    #[test]
    fn signal_serializes_type_field() {
        let json = serde_json::to_value(build(SignalType::Exit, 0.0, 0.7)).unwrap();
        assert_eq!(json["type"], "exit");
    }
}
