use std::path::PathBuf;
use std::str::FromStr;

use crate::{Error, Result};

/// Process configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// TOML file listing the strategies to run.
    pub strategy_config_path: PathBuf,
    /// Directory holding `{SYMBOL}.json` candle files.
    pub candles_dir: PathBuf,
    /// Per-symbol cap on the candle history kept by the runner. Strategies
    /// that need a longer history raise it.
    pub max_history: usize,
    /// Starting capital for backtests, in quote currency.
    pub initial_capital: f64,
}

impl Config {
    const DEFAULT_MAX_HISTORY: usize = 1000;
    const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

    /// Load configuration from environment variables.
    /// Loads `.env` if present. Malformed values are reported as `Error::Config`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let max_history = parsed_env("MAX_HISTORY")?.unwrap_or(Self::DEFAULT_MAX_HISTORY);
        if max_history == 0 {
            return Err(Error::Config("MAX_HISTORY must be greater than zero".into()));
        }

        let initial_capital =
            parsed_env("INITIAL_CAPITAL")?.unwrap_or(Self::DEFAULT_INITIAL_CAPITAL);
        if !(initial_capital.is_finite() && initial_capital > 0.0) {
            return Err(Error::Config(format!(
                "INITIAL_CAPITAL must be a positive number, got {initial_capital}"
            )));
        }

        Ok(Config {
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string())
                .into(),
            candles_dir: optional_env("CANDLES_DIR")
                .unwrap_or_else(|| "data".to_string())
                .into(),
            max_history,
            initial_capital,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}='{raw}' is invalid: {e}"))),
    }
}
