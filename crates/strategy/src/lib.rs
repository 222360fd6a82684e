pub mod arbitrage;
pub mod backtest;
pub mod base;
pub mod config;
pub mod indicators;
pub mod mean_reversion;
pub mod ml;
pub mod params;
pub mod registry;
pub mod runner;
pub mod trend_following;

#[cfg(test)]
mod testing;

pub use base::{SignalInput, StrategyStatus};
pub use config::{StrategyConfig, StrategyFileConfig};
pub use mean_reversion::MeanReversionStrategy;
pub use ml::MlStrategy;
pub use params::{ParamSpec, ParamValue, Params};
pub use registry::{StrategyDescriptor, StrategyRegistry};
pub use runner::SignalRunner;
pub use trend_following::TrendFollowingStrategy;

use serde::{Deserialize, Serialize};

use common::{Candle, Result, Signal};

/// The closed set of strategy implementations the registry can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MeanReversion,
    TrendFollowing,
    #[serde(rename = "ml_strategy")]
    Ml,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::MeanReversion,
        StrategyKind::TrendFollowing,
        StrategyKind::Ml,
    ];

    /// Registry key, e.g. `"mean_reversion"`.
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::TrendFollowing => "trend_following",
            StrategyKind::Ml => "ml_strategy",
        }
    }

    /// Case-insensitive lookup by registry key.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mean_reversion" => Some(StrategyKind::MeanReversion),
            "trend_following" => Some(StrategyKind::TrendFollowing),
            "ml_strategy" | "ml" => Some(StrategyKind::Ml),
            _ => None,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All strategy implementations must satisfy this trait.
///
/// One instance is only ever driven by one caller at a time; distinct
/// instances share no mutable state and may be evaluated in parallel.
pub trait Strategy: Send + Sync {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    fn kind(&self) -> StrategyKind;

    /// Shortest candle window `generate_signal` will evaluate.
    fn min_history(&self) -> usize;

    /// Candles a caller should keep for this strategy to reach full
    /// operation. Strategies that train on history need more than
    /// `min_history`.
    fn required_history(&self) -> usize {
        self.min_history()
    }

    /// Seed the stored history used when a call provides none.
    fn initialize(&mut self, series: &[Candle]);

    /// Append newly closed candles to the stored history.
    fn update(&mut self, candles: &[Candle]);

    /// Evaluate the window and produce a signal (Hold included).
    ///
    /// Returns `None` when there is not enough data to evaluate; the strategy
    /// state is left untouched in that case.
    fn generate_signal(&mut self, input: &SignalInput<'_>) -> Option<Signal>;

    fn get_status(&self) -> StrategyStatus;

    fn is_enabled(&self) -> bool;

    /// Replace one parameter after construction. The full parameter set is
    /// re-validated; on error nothing changes.
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<()>;
}
