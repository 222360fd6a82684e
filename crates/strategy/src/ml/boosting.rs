//! Gradient boosting with logistic loss over smartcore regression trees.

use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

use super::model::{check_inputs, Classifier, TrainingError};

const LEARNING_RATE: f64 = 0.1;
const MIN_SAMPLES_SPLIT: usize = 2;
const MIN_SAMPLES_LEAF: usize = 1;

type Stage = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>, TrainingError> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
        .map_err(|e| TrainingError::Backend(format!("feature matrix: {e:?}")))
}

pub struct GradientBoosting {
    n_estimators: usize,
    max_depth: usize,
    /// Log-odds of the training base rate.
    base_score: f64,
    stages: Vec<Stage>,
}

impl GradientBoosting {
    pub fn new(n_estimators: usize, max_depth: usize) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            max_depth: max_depth.clamp(1, usize::from(u16::MAX)),
            base_score: 0.0,
            stages: Vec::new(),
        }
    }

    fn parameters(&self) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(self.max_depth as u16)
            .with_min_samples_split(MIN_SAMPLES_SPLIT)
            .with_min_samples_leaf(MIN_SAMPLES_LEAF)
    }

    fn raw_score(&self, row: &[f64]) -> Option<f64> {
        let x = matrix(&[row.to_vec()]).ok()?;
        self.stages.iter().try_fold(self.base_score, |acc, stage| {
            let step = stage.predict(&x).ok()?;
            Some(acc + LEARNING_RATE * step.first().copied()?)
        })
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), TrainingError> {
        check_inputs(rows, labels)?;
        let n = rows.len();
        let y: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();

        let rate = (y.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        self.base_score = (rate / (1.0 - rate)).ln();
        self.stages.clear();

        let x = matrix(rows)?;
        let mut scores = vec![self.base_score; n];

        for _ in 0..self.n_estimators {
            let residuals: Vec<f64> = scores
                .iter()
                .zip(&y)
                .map(|(&f, &target)| target - sigmoid(f))
                .collect();
            let stage = DecisionTreeRegressor::fit(&x, &residuals, self.parameters())
                .map_err(|e| TrainingError::Backend(format!("boosting stage: {e:?}")))?;
            let step = stage
                .predict(&x)
                .map_err(|e| TrainingError::Backend(format!("boosting stage: {e:?}")))?;
            for (score, delta) in scores.iter_mut().zip(&step) {
                *score += LEARNING_RATE * delta;
            }
            self.stages.push(stage);
        }

        if scores.iter().any(|s| !s.is_finite()) {
            self.stages.clear();
            return Err(TrainingError::Diverged("non-finite boosting score".into()));
        }
        Ok(())
    }

    /// A row the trees cannot score comes back as an even split.
    fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        match self.raw_score(row) {
            Some(z) => {
                let p1 = sigmoid(z);
                [1.0 - p1, p1]
            }
            None => [0.5, 0.5],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_score_matches_class_balance() {
        let rows: Vec<Vec<f64>> = (0..8).map(|_| vec![1.0]).collect();
        let labels = [1, 1, 1, 0, 0, 0, 0, 0];
        let mut model = GradientBoosting::new(5, 2);
        model.fit(&rows, &labels).unwrap();
        // constant features: every stage is a zero-residual-mean leaf
        let [_, p1] = model.predict_proba(&[1.0]);
        assert!((p1 - 3.0 / 8.0).abs() < 1e-9);
    }

    #[test]
    fn single_class_does_not_blow_up() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let mut model = GradientBoosting::new(10, 3);
        model.fit(&rows, &[1; 10]).unwrap();
        let [p0, p1] = model.predict_proba(&[4.0]);
        assert!(p1 > 0.99 && p0 >= 0.0);
    }

    #[test]
    fn stages_move_scores_toward_labels() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let labels: Vec<u8> = (0..40).map(|i| u8::from(i >= 20)).collect();
        let mut model = GradientBoosting::new(60, 2);
        model.fit(&rows, &labels).unwrap();
        assert_eq!(model.stages.len(), 60);
        assert!(model.predict_proba(&[35.0, 1.0])[1] > 0.75);
        assert!(model.predict_proba(&[3.0, 1.0])[0] > 0.75);
    }
}
