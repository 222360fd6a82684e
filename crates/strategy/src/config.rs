use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use common::{Error, Result};

use crate::params::{ParamValue, Params};

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "mean_reversion"
/// name = "BTC mean reversion"
/// symbol = "BTCUSDT"
///
/// [strategy.params]
/// bb_period = 20
/// rsi_oversold = 25.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Registry key: "mean_reversion", "trend_following" or "ml_strategy".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Human-readable name shown in logs and status.
    pub name: String,
    /// Symbol the strategy is evaluated on, e.g. "BTCUSDT".
    pub symbol: String,
    /// Strategy-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

impl StrategyConfig {
    /// Convert the raw TOML parameter table into typed parameters.
    pub fn params(&self) -> Result<Params> {
        self.params
            .iter()
            .map(|(k, v)| {
                ParamValue::try_from(v.clone())
                    .map(|v| (k.clone(), v))
                    .map_err(|e| Error::Config(format!("strategy '{}', parameter '{k}': {e}", self.name)))
            })
            .collect()
    }
}

impl StrategyFileConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("invalid strategy config: {e}")))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read strategy config at '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }
}
