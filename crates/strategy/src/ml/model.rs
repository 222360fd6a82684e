use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::boosting::GradientBoosting;
use super::forest::RandomForest;
use super::mlp::Mlp;

/// Errors that stop a model from being trained.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainingError {
    #[error("only {found} known feature columns, at least {needed} required")]
    InsufficientFeatures { found: usize, needed: usize },

    #[error("only {found} clean training rows, at least {needed} required")]
    InsufficientSamples { found: usize, needed: usize },

    #[error("feature rows have inconsistent widths")]
    RaggedFeatures,

    #[error("model diverged: {0}")]
    Diverged(String),

    #[error("model backend failed: {0}")]
    Backend(String),
}

impl From<TrainingError> for common::Error {
    fn from(e: TrainingError) -> Self {
        common::Error::Training(e.to_string())
    }
}

/// Binary classifier over standardised feature rows. Class 1 means "up".
pub trait Classifier: Send + Sync {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), TrainingError>;

    /// `[P(class 0), P(class 1)]`, summing to 1.
    fn predict_proba(&self, row: &[f64]) -> [f64; 2];

    fn predict(&self, row: &[f64]) -> u8 {
        let [p0, p1] = self.predict_proba(row);
        u8::from(p1 > p0)
    }
}

/// Model family selected by the `model_type` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    RandomForest,
    GradientBoosting,
    NeuralNetwork,
}

impl ModelType {
    pub const NAMES: [&'static str; 3] = ["random_forest", "gradient_boosting", "neural_network"];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::RandomForest => "random_forest",
            ModelType::GradientBoosting => "gradient_boosting",
            ModelType::NeuralNetwork => "neural_network",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "random_forest" => Some(ModelType::RandomForest),
            "gradient_boosting" => Some(ModelType::GradientBoosting),
            "neural_network" => Some(ModelType::NeuralNetwork),
            _ => None,
        }
    }

    /// An untrained classifier of this family.
    pub fn build(self, config: &ModelConfig) -> Box<dyn Classifier> {
        match self {
            ModelType::RandomForest => Box::new(RandomForest::new(
                config.n_estimators,
                config.max_depth,
                config.seed,
            )),
            ModelType::GradientBoosting => Box::new(GradientBoosting::new(
                config.n_estimators,
                config.boosting_max_depth,
            )),
            ModelType::NeuralNetwork => Box::new(Mlp::new(config.seed)),
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hyperparameters shared by the model families.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    pub n_estimators: usize,
    /// Depth limit of random-forest trees.
    pub max_depth: usize,
    /// Depth limit of each boosting stage.
    pub boosting_max_depth: usize,
    pub seed: u64,
}

/// Fraction of `labels` matched by the classifier on `rows`.
pub fn accuracy(model: &dyn Classifier, rows: &[Vec<f64>], labels: &[u8]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let correct = rows
        .iter()
        .zip(labels)
        .filter(|(row, &label)| model.predict(row) == label)
        .count();
    correct as f64 / rows.len() as f64
}

/// Shared input checks for `Classifier::fit`.
pub(crate) fn check_inputs(rows: &[Vec<f64>], labels: &[u8]) -> Result<usize, TrainingError> {
    if rows.is_empty() || rows.len() != labels.len() {
        return Err(TrainingError::InsufficientSamples {
            found: rows.len().min(labels.len()),
            needed: 1,
        });
    }
    let width = rows[0].len();
    if width == 0 || rows.iter().any(|r| r.len() != width) {
        return Err(TrainingError::RaggedFeatures);
    }
    Ok(width)
}
