//! Bagged random forest classifier.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::model::{check_inputs, Classifier, TrainingError};
use super::tree::{RegressionTree, TreeConfig};

#[derive(Debug, Clone)]
pub struct RandomForest {
    n_trees: usize,
    max_depth: usize,
    seed: u64,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(n_trees: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            n_trees: n_trees.max(1),
            max_depth,
            seed,
            trees: Vec::new(),
        }
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), TrainingError> {
        let width = check_inputs(rows, labels)?;
        let targets: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        let n = rows.len();

        // sqrt(n_features) candidates per split
        let config = TreeConfig {
            max_depth: self.max_depth,
            max_features: Some((width as f64).sqrt().ceil() as usize),
            ..TreeConfig::default()
        };

        self.trees = (0..self.n_trees)
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(config, rows, &targets, &sample, &mut rng)
            })
            .collect();
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        if self.trees.is_empty() {
            return [0.5, 0.5];
        }
        let votes: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        let p1 = (votes / self.trees.len() as f64).clamp(0.0, 1.0);
        [1.0 - p1, p1]
    }
}
