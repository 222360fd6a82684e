//! Fixtures shared by unit tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use common::{Candle, Exposure, Result, Signal, SignalType};

use crate::base::{SignalInput, StrategyStatus};
use crate::params::{ParamValue, Params};
use crate::{Strategy, StrategyKind};

pub fn t(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i)
}

pub fn candle(i: i64, close: f64) -> Candle {
    Candle {
        open_time: t(i),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 10.0,
        quote_volume: 0.0,
        trades: 1,
    }
}

pub fn candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| candle(i as i64, c))
        .collect()
}

enum Plan {
    /// Cycle through the list, one entry per call.
    Cycle(Vec<SignalType>),
    /// Emit the listed type when the window has that many candles, else Hold.
    AtLength(Vec<(usize, SignalType)>),
}

/// Strategy that replays a fixed plan instead of reading indicators.
pub struct Scripted {
    name: String,
    plan: Plan,
    calls: u64,
    enabled: bool,
}

impl Scripted {
    pub fn cycle(script: &[SignalType]) -> Self {
        Self {
            name: "scripted".into(),
            plan: Plan::Cycle(script.to_vec()),
            calls: 0,
            enabled: true,
        }
    }

    pub fn at_length(plan: &[(usize, SignalType)]) -> Self {
        Self {
            name: "scripted".into(),
            plan: Plan::AtLength(plan.to_vec()),
            calls: 0,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn boxed(self) -> Box<dyn Strategy> {
        Box::new(self)
    }
}

impl Strategy for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn min_history(&self) -> usize {
        1
    }

    fn initialize(&mut self, _: &[Candle]) {}

    fn update(&mut self, _: &[Candle]) {}

    fn generate_signal(&mut self, input: &SignalInput<'_>) -> Option<Signal> {
        let len = input.history.map_or(0, <[Candle]>::len);
        if len < self.min_history() {
            return None;
        }
        let kind = match &self.plan {
            Plan::Cycle(script) => *script.get(self.calls as usize % script.len().max(1))?,
            Plan::AtLength(plan) => plan
                .iter()
                .find(|(at, _)| *at == len)
                .map_or(SignalType::Hold, |(_, kind)| *kind),
        };
        self.calls += 1;
        let strength = match kind {
            SignalType::Buy => 0.5,
            SignalType::Sell => -0.5,
            _ => 0.0,
        };
        Some(Signal::new(
            kind,
            strength,
            0.5,
            input.current_price,
            input.at,
            input.symbol,
            BTreeMap::new(),
            "scripted",
        ))
    }

    fn get_status(&self) -> StrategyStatus {
        StrategyStatus {
            name: self.name.clone(),
            kind: self.kind(),
            position: Exposure::Flat,
            signals_generated: self.calls,
            last_signal: None,
            parameters: Params::new(),
            enabled: self.enabled,
            ready: true,
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_parameter(&mut self, _: &str, _: ParamValue) -> Result<()> {
        Ok(())
    }
}
