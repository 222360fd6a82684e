//! CART regression tree with a squared-error split criterion.
//!
//! Fitted on 0/1 targets the leaf means are class-1 probabilities; for binary
//! labels the variance criterion ranks splits like Gini impurity. The random
//! forest grows these on bootstrap samples.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split (`None` = all).
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    config: TreeConfig,
    root: Node,
}

impl RegressionTree {
    /// Grow a tree on the rows selected by `indices` (repeats allowed).
    pub fn fit(
        config: TreeConfig,
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut tree = Self {
            config,
            root: Node::Leaf(0.0),
        };
        tree.root = tree.grow(rows, targets, indices.to_vec(), n_features, 0, rng);
        tree
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row.get(*feature).copied().unwrap_or(f64::NAN);
                    node = if v <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    fn grow(
        &self,
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: Vec<usize>,
        n_features: usize,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> Node {
        let n = indices.len();
        if n == 0 {
            return Node::Leaf(0.0);
        }
        let sum: f64 = indices.iter().map(|&i| targets[i]).sum();
        let sum_sq: f64 = indices.iter().map(|&i| targets[i] * targets[i]).sum();
        let mean = sum / n as f64;
        let sse = sum_sq - sum * sum / n as f64;

        if depth >= self.config.max_depth
            || n < self.config.min_samples_split.max(2)
            || sse <= f64::EPSILON
        {
            return Node::Leaf(mean);
        }

        let mut features: Vec<usize> = (0..n_features).collect();
        if let Some(k) = self.config.max_features {
            features.shuffle(rng);
            features.truncate(k.clamp(1, n_features.max(1)));
        }

        let Some(best) = self.best_split(rows, targets, &indices, &features, sum, sum_sq) else {
            return Node::Leaf(mean);
        };
        if best.sse >= sse - 1e-12 {
            return Node::Leaf(mean);
        }

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| rows[i][best.feature] <= best.threshold);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.grow(rows, targets, left, n_features, depth + 1, rng)),
            right: Box::new(self.grow(rows, targets, right, n_features, depth + 1, rng)),
        }
    }

    /// Sort each candidate feature once and sweep all cut points.
    fn best_split(
        &self,
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        features: &[usize],
        total: f64,
        total_sq: f64,
    ) -> Option<BestSplit> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<BestSplit> = None;
        let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(n);

        for &feature in features {
            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (rows[i][feature], targets[i])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for k in 1..n {
                let y = sorted[k - 1].1;
                left_sum += y;
                left_sq += y * y;

                if sorted[k].0 <= sorted[k - 1].0 || k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / k as f64)
                    + (right_sq - right_sum * right_sum / (n - k) as f64);

                if best.map_or(true, |b| sse < b.sse - 1e-12) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (sorted[k - 1].0 + sorted[k].0) / 2.0,
                        sse,
                    });
                }
            }
        }
        best
    }
}
