//! Supervised direction classifier over indicator features.
//!
//! The model predicts whether the close `prediction_horizon` bars ahead will
//! be higher than the current close, and acts only when the winning class
//! probability clears `confidence_threshold`.

pub mod boosting;
pub mod features;
pub mod forest;
pub mod mlp;
pub mod model;
pub mod scaler;
pub mod tree;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use common::{Candle, Error, Result, Signal, SignalType};

use crate::base::{
    override_param, resolve, trailing, SignalInput, StrategyCore, StrategyParams, StrategyStatus,
};
use crate::indicators::{self, IndicatorSpec};
use crate::params::{ensure, ParamReader, ParamSpec, ParamValue, Params};
use crate::{Strategy, StrategyKind};

pub use model::{Classifier, ModelConfig, ModelType, TrainingError};
pub use scaler::StandardScaler;

/// Known feature columns needed to train.
const MIN_FEATURE_COLUMNS: usize = 3;
/// Shortest history the strategy evaluates.
const MIN_HISTORY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct MlParams {
    pub model_type: ModelType,
    pub lookback_window: usize,
    pub prediction_horizon: usize,
    pub feature_columns: Vec<String>,
    pub confidence_threshold: f64,
    pub retrain_interval: usize,
    pub min_training_samples: usize,
    pub test_split: f64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub boosting_max_depth: usize,
    pub seed: u64,
}

impl StrategyParams for MlParams {
    fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::select(
                "model_type",
                "random_forest",
                &ModelType::NAMES,
                "Classifier family",
            ),
            ParamSpec::int("lookback_window", 50, 10, 500, "Candles used for the live feature row"),
            ParamSpec::int("prediction_horizon", 5, 1, 50, "Bars ahead the label looks"),
            ParamSpec::list(
                "feature_columns",
                &["close", "volume", "rsi", "macd", "bb_width"],
                "Indicator columns fed to the model",
            ),
            ParamSpec::float("confidence_threshold", 0.7, 0.5, 0.95, "Probability needed to act"),
            ParamSpec::int("retrain_interval", 100, 1, 100_000, "New candles that trigger retraining"),
            ParamSpec::int("min_training_samples", 1000, 100, 1_000_000, "Clean rows needed to train"),
            ParamSpec::float("test_split", 0.2, 0.05, 0.5, "Most recent fraction held out for accuracy"),
            ParamSpec::int("n_estimators", 100, 1, 1000, "Trees in the ensemble"),
            ParamSpec::int("max_depth", 10, 1, 32, "Maximum random forest tree depth"),
            ParamSpec::int("boosting_max_depth", 5, 1, 32, "Maximum depth of each boosting stage"),
            ParamSpec::int("seed", 42, 0, i64::MAX, "Random seed for training"),
        ]
    }

    fn read(reader: &ParamReader<'_>) -> Result<Self> {
        let model_name = reader.string("model_type")?;
        let model_type = ModelType::from_name(&model_name)
            .ok_or_else(|| Error::invalid_parameter("model_type", format!("unknown model '{model_name}'")))?;
        let feature_columns = reader.list("feature_columns")?;
        ensure(!feature_columns.is_empty(), "feature_columns", "must not be empty")?;

        Ok(Self {
            model_type,
            lookback_window: reader.usize("lookback_window")?,
            prediction_horizon: reader.usize("prediction_horizon")?,
            feature_columns,
            confidence_threshold: reader.f64("confidence_threshold")?,
            retrain_interval: reader.usize("retrain_interval")?,
            min_training_samples: reader.usize("min_training_samples")?,
            test_split: reader.f64("test_split")?,
            n_estimators: reader.usize("n_estimators")?,
            max_depth: reader.usize("max_depth")?,
            boosting_max_depth: reader.usize("boosting_max_depth")?,
            seed: reader.u64("seed")?,
        })
    }
}

impl MlParams {
    fn model_config(&self) -> ModelConfig {
        ModelConfig {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            boosting_max_depth: self.boosting_max_depth,
            seed: self.seed,
        }
    }
}

/// Outcome of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub model_type: ModelType,
    /// Accuracy on the held-out split.
    pub accuracy: f64,
    pub train_samples: usize,
    pub test_samples: usize,
    pub features: Vec<String>,
    /// Open time of the newest candle the model has seen.
    pub trained_until: DateTime<Utc>,
}

struct TrainedModel {
    classifier: Box<dyn Classifier>,
    scaler: StandardScaler,
    report: TrainingReport,
}

/// Build, fit and score a model on `series`.
fn fit_model(
    params: &MlParams,
    spec: &IndicatorSpec,
    series: &[Candle],
) -> std::result::Result<TrainedModel, TrainingError> {
    let frame = indicators::compute(series, spec);
    let columns = features::known_columns(&frame, &params.feature_columns);
    if columns.len() < MIN_FEATURE_COLUMNS {
        return Err(TrainingError::InsufficientFeatures {
            found: columns.len(),
            needed: MIN_FEATURE_COLUMNS,
        });
    }

    let set = features::training_set(&frame, &columns, params.prediction_horizon);
    if set.len() < params.min_training_samples.max(2) {
        return Err(TrainingError::InsufficientSamples {
            found: set.len(),
            needed: params.min_training_samples,
        });
    }

    let (train, test) = set.split(params.test_split);
    let scaler = StandardScaler::fit(&train.rows);
    let mut classifier = params.model_type.build(&params.model_config());
    classifier.fit(&scaler.transform_all(&train.rows), &train.labels)?;
    let accuracy = model::accuracy(
        classifier.as_ref(),
        &scaler.transform_all(&test.rows),
        &test.labels,
    );

    let trained_until = series
        .last()
        .map(|c| c.open_time)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    Ok(TrainedModel {
        classifier,
        scaler,
        report: TrainingReport {
            model_type: params.model_type,
            accuracy,
            train_samples: train.len(),
            test_samples: test.len(),
            features: columns,
            trained_until,
        },
    })
}

/// Store the result of a training attempt. A failure discards any previous
/// model so the strategy reports not ready until training succeeds again.
fn settle(
    name: &str,
    slot: &mut Option<TrainedModel>,
    last_error: &mut Option<TrainingError>,
    outcome: std::result::Result<TrainedModel, TrainingError>,
) -> std::result::Result<TrainingReport, TrainingError> {
    match outcome {
        Ok(trained) => {
            let report = trained.report.clone();
            info!(
                strategy = %name,
                model = %report.model_type,
                accuracy = report.accuracy,
                train_samples = report.train_samples,
                test_samples = report.test_samples,
                "ML model trained"
            );
            *slot = Some(trained);
            *last_error = None;
            Ok(report)
        }
        Err(e) => {
            warn!(strategy = %name, error = %e, "ML training failed");
            *slot = None;
            *last_error = Some(e.clone());
            Err(e)
        }
    }
}

pub struct MlStrategy {
    core: StrategyCore,
    params: MlParams,
    spec: IndicatorSpec,
    model: Option<TrainedModel>,
    last_error: Option<TrainingError>,
    /// Newest candle seen by the last training attempt, successful or not.
    attempted_until: Option<DateTime<Utc>>,
}

impl MlStrategy {
    pub fn new(name: impl Into<String>, params: &Params) -> Result<Self> {
        let (base, specific, resolved) = resolve::<MlParams>(params)?;
        let spec = features::feature_spec();
        let mut strategy = Self {
            core: StrategyCore::new(name, StrategyKind::Ml, base, resolved),
            params: specific,
            spec,
            model: None,
            last_error: None,
            attempted_until: None,
        };
        strategy.core.set_history_cap(strategy.required_history());
        Ok(strategy)
    }

    pub fn schema() -> Vec<ParamSpec> {
        MlParams::full_schema()
    }

    pub fn params(&self) -> &MlParams {
        &self.params
    }

    /// True once a model has been trained and the last attempt succeeded.
    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn training_report(&self) -> Option<&TrainingReport> {
        self.model.as_ref().map(|m| &m.report)
    }

    pub fn last_training_error(&self) -> Option<&TrainingError> {
        self.last_error.as_ref()
    }

    /// Train synchronously on `series`. Callers that must not block can run
    /// this on a blocking thread.
    pub fn train(&mut self, series: &[Candle]) -> std::result::Result<TrainingReport, TrainingError> {
        self.attempted_until = series.last().map(|c| c.open_time);
        let outcome = fit_model(&self.params, &self.spec, series);
        settle(self.core.name(), &mut self.model, &mut self.last_error, outcome)
    }

    /// Never attempted, or at least `retrain_interval` candles newer than the
    /// last attempt. A failed attempt waits out the same interval.
    fn retrain_due(&self, series: &[Candle]) -> bool {
        match self.attempted_until {
            None => true,
            Some(until) => {
                let fresh = series
                    .iter()
                    .rev()
                    .take_while(|c| c.open_time > until)
                    .count();
                fresh >= self.params.retrain_interval
            }
        }
    }
}

impl Strategy for MlStrategy {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Ml
    }

    fn min_history(&self) -> usize {
        MIN_HISTORY
    }

    /// Enough candles for `min_training_samples` clean rows after the
    /// feature warm-up and the label horizon.
    fn required_history(&self) -> usize {
        (self.params.min_training_samples + self.spec.min_length() + self.params.prediction_horizon)
            .max(MIN_HISTORY)
    }

    fn initialize(&mut self, series: &[Candle]) {
        self.core.initialize(series);
    }

    fn update(&mut self, candles: &[Candle]) {
        self.core.update(candles);
    }

    fn generate_signal(&mut self, input: &SignalInput<'_>) -> Option<Signal> {
        let series = input.history.unwrap_or_else(|| self.core.history());
        if series.len() < self.min_history() {
            return None;
        }

        if self.retrain_due(series) {
            self.attempted_until = series.last().map(|c| c.open_time);
            let outcome = fit_model(&self.params, &self.spec, series);
            settle(self.core.name(), &mut self.model, &mut self.last_error, outcome).ok()?;
        }
        let model = self.model.as_ref()?;

        let span = self.params.lookback_window + self.spec.min_length();
        let window = trailing(series, 1, span)?;
        let frame = indicators::compute(window, &self.spec);
        let row = features::latest_row(&frame, &model.report.features)?;
        let [p0, p1] = model.classifier.predict_proba(&model.scaler.transform(&row));
        if !(p0.is_finite() && p1.is_finite()) {
            return None;
        }

        let prediction = u8::from(p1 > p0);
        let accuracy = model.report.accuracy;
        let threshold = self.params.confidence_threshold;
        let best = p0.max(p1);
        let (kind, strength, confidence, rationale) = if prediction == 1 && p1 > threshold {
            (
                SignalType::Buy,
                p1.min(1.0),
                p1,
                format!("Model predicts up (p: {p1:.2}, accuracy: {accuracy:.2})"),
            )
        } else if prediction == 0 && p0 > threshold {
            (
                SignalType::Sell,
                -p0.min(1.0),
                p0,
                format!("Model predicts down (p: {p0:.2}, accuracy: {accuracy:.2})"),
            )
        } else {
            (
                SignalType::Hold,
                0.0,
                best,
                format!("Model inconclusive (max p: {best:.2})"),
            )
        };

        let indicators = BTreeMap::from([
            ("ml_prediction".to_string(), f64::from(prediction)),
            ("ml_probability".to_string(), p1),
            ("ml_confidence".to_string(), best),
            ("model_accuracy".to_string(), accuracy),
            ("features_used".to_string(), model.report.features.len() as f64),
        ]);

        let signal = Signal::new(
            kind,
            strength,
            confidence,
            input.current_price,
            input.at,
            input.symbol,
            indicators,
            rationale,
        );
        Some(self.core.record(signal))
    }

    fn get_status(&self) -> StrategyStatus {
        self.core.status(self.is_ready())
    }

    fn is_enabled(&self) -> bool {
        self.core.base().enabled
    }

    /// Any accepted change discards the trained model.
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let (base, specific, resolved) =
            override_param::<MlParams>(self.core.parameters(), name, value)?;
        self.params = specific;
        self.core.reconfigure(base, resolved);
        self.core.set_history_cap(self.required_history());
        self.model = None;
        self.last_error = None;
        self.attempted_until = None;
        Ok(())
    }
}
