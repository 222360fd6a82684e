use serde::Serialize;
use tracing::{error, info};

use common::{Error, Result};

use crate::config::StrategyConfig;
use crate::params::{ParamSpec, Params};
use crate::{MeanReversionStrategy, MlStrategy, Strategy, StrategyKind, TrendFollowingStrategy};

/// Catalogue entry returned by [`StrategyRegistry::list_available`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub parameter_schema: Vec<ParamSpec>,
}

/// Builds strategy instances by name. Owned by the caller; there is no
/// process-wide instance.
pub struct StrategyRegistry {
    catalogue: Vec<StrategyDescriptor>,
    last_error: Option<String>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        let catalogue = StrategyKind::ALL.iter().map(|&kind| describe(kind)).collect();
        Self {
            catalogue,
            last_error: None,
        }
    }

    pub fn list_available(&self) -> &[StrategyDescriptor] {
        &self.catalogue
    }

    /// Message of the most recent failed `create`, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Build a strategy, reporting unknown names and invalid parameters as
    /// typed errors.
    pub fn try_create(&self, name: &str, params: &Params) -> Result<Box<dyn Strategy>> {
        self.try_create_named(name, name.trim(), params)
    }

    /// Like [`try_create`](Self::try_create) but with an explicit instance name.
    pub fn try_create_named(
        &self,
        kind: &str,
        instance: &str,
        params: &Params,
    ) -> Result<Box<dyn Strategy>> {
        let kind = StrategyKind::from_name(kind)
            .ok_or_else(|| Error::UnknownStrategy(kind.to_string()))?;
        let strategy: Box<dyn Strategy> = match kind {
            StrategyKind::MeanReversion => Box::new(MeanReversionStrategy::new(instance, params)?),
            StrategyKind::TrendFollowing => Box::new(TrendFollowingStrategy::new(instance, params)?),
            StrategyKind::Ml => Box::new(MlStrategy::new(instance, params)?),
        };
        info!(name = %strategy.name(), kind = %kind, "Created strategy");
        Ok(strategy)
    }

    /// Build a strategy, or log the failure, remember it as `last_error` and
    /// return `None`.
    pub fn create(&mut self, name: &str, params: &Params) -> Option<Box<dyn Strategy>> {
        let outcome = self.try_create(name, params);
        self.settle(name, outcome)
    }

    /// Build the strategy described by one `[[strategy]]` config table.
    pub fn create_from_config(&mut self, cfg: &StrategyConfig) -> Option<Box<dyn Strategy>> {
        let outcome = cfg
            .params()
            .and_then(|params| self.try_create_named(&cfg.strategy_type, &cfg.name, &params));
        self.settle(&cfg.strategy_type, outcome)
    }

    fn settle(
        &mut self,
        name: &str,
        outcome: Result<Box<dyn Strategy>>,
    ) -> Option<Box<dyn Strategy>> {
        match outcome {
            Ok(strategy) => {
                self.last_error = None;
                Some(strategy)
            }
            Err(e) => {
                error!(strategy = %name, error = %e, "Failed to create strategy");
                self.last_error = Some(e.to_string());
                None
            }
        }
    }
}

fn describe(kind: StrategyKind) -> StrategyDescriptor {
    match kind {
        StrategyKind::MeanReversion => StrategyDescriptor {
            name: kind.as_str(),
            display_name: "Mean Reversion",
            description: "Bollinger band touches confirmed by RSI extremes and volume spikes",
            parameter_schema: MeanReversionStrategy::schema(),
        },
        StrategyKind::TrendFollowing => StrategyDescriptor {
            name: kind.as_str(),
            display_name: "Trend Following",
            description: "Moving-average trend confirmed by MACD and ADX strength",
            parameter_schema: TrendFollowingStrategy::schema(),
        },
        StrategyKind::Ml => StrategyDescriptor {
            name: kind.as_str(),
            display_name: "Machine Learning",
            description: "Classifier predicting price direction from indicator features",
            parameter_schema: MlStrategy::schema(),
        },
    }
}
