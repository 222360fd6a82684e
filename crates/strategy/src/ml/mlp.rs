//! Small feed-forward network: ReLU hidden layers, sigmoid output, trained
//! with mini-batch SGD on binary cross-entropy.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::model::{check_inputs, Classifier, TrainingError};

const HIDDEN: [usize; 2] = [50, 25];
const EPOCHS: usize = 200;
const BATCH_SIZE: usize = 16;
const LEARNING_RATE: f64 = 0.05;

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[derive(Debug, Clone)]
struct Dense {
    /// `weights[out][in]`.
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl Dense {
    /// Glorot-uniform initialisation.
    fn new(inputs: usize, outputs: usize, rng: &mut ChaCha8Rng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..outputs)
            .map(|_| (0..inputs).map(|_| rng.gen_range(-limit..=limit)).collect())
            .collect();
        Self {
            weights,
            biases: vec![0.0; outputs],
        }
    }

    fn linear(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(w, b)| w.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }

    fn zeros_like(&self) -> Dense {
        Dense {
            weights: self.weights.iter().map(|w| vec![0.0; w.len()]).collect(),
            biases: vec![0.0; self.biases.len()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mlp {
    seed: u64,
    layers: Vec<Dense>,
}

impl Mlp {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            layers: Vec::new(),
        }
    }

    /// Post-activation outputs of every layer, input first.
    fn forward(&self, row: &[f64]) -> Vec<Vec<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(row.to_vec());
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.linear(&activations[i]);
            let a = if i == last {
                z.into_iter().map(sigmoid).collect()
            } else {
                z.into_iter().map(|v| v.max(0.0)).collect()
            };
            activations.push(a);
        }
        activations
    }

    /// Accumulate the cross-entropy gradient of one sample into `grads`.
    fn backprop(&self, row: &[f64], label: u8, grads: &mut [Dense]) {
        let activations = self.forward(row);
        let output = activations[self.layers.len()][0];
        let mut delta = vec![output - f64::from(label)];

        for l in (0..self.layers.len()).rev() {
            let input = &activations[l];
            let grad = &mut grads[l];
            for (j, d) in delta.iter().enumerate() {
                for (g, x) in grad.weights[j].iter_mut().zip(input) {
                    *g += d * x;
                }
                grad.biases[j] += d;
            }
            if l > 0 {
                let weights = &self.layers[l].weights;
                delta = (0..input.len())
                    .map(|k| {
                        if input[k] > 0.0 {
                            delta.iter().enumerate().map(|(j, d)| weights[j][k] * d).sum()
                        } else {
                            0.0
                        }
                    })
                    .collect();
            }
        }
    }
}

impl Classifier for Mlp {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), TrainingError> {
        let width = check_inputs(rows, labels)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut sizes = vec![width];
        sizes.extend(HIDDEN);
        sizes.push(1);
        self.layers = sizes
            .windows(2)
            .map(|w| Dense::new(w[0], w[1], &mut rng))
            .collect();

        let mut order: Vec<usize> = (0..rows.len()).collect();
        for _ in 0..EPOCHS {
            order.shuffle(&mut rng);
            for batch in order.chunks(BATCH_SIZE) {
                let mut grads: Vec<Dense> = self.layers.iter().map(Dense::zeros_like).collect();
                for &i in batch {
                    self.backprop(&rows[i], labels[i], &mut grads);
                }
                let step = LEARNING_RATE / batch.len() as f64;
                for (layer, grad) in self.layers.iter_mut().zip(&grads) {
                    for (w, g) in layer.weights.iter_mut().zip(&grad.weights) {
                        for (w, g) in w.iter_mut().zip(g) {
                            *w -= step * g;
                        }
                    }
                    for (b, g) in layer.biases.iter_mut().zip(&grad.biases) {
                        *b -= step * g;
                    }
                }
            }
        }

        let diverged = self
            .layers
            .iter()
            .flat_map(|l| l.weights.iter().flatten().chain(&l.biases))
            .any(|w| !w.is_finite());
        if diverged {
            self.layers.clear();
            return Err(TrainingError::Diverged("non-finite network weight".into()));
        }
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        if self.layers.is_empty() {
            return [0.5, 0.5];
        }
        let p1 = self
            .forward(row)
            .last()
            .and_then(|out| out.first().copied())
            .unwrap_or(0.5);
        [1.0 - p1, p1]
    }
}
