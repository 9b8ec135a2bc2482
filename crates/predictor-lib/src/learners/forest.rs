//! Bootstrap-aggregated regression trees

use super::tree::{RegressionTree, SplitSearch, TreeParams};
use super::Objective;
use crate::error::Result;
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Depth cap for fully grown forest trees
const FOREST_MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    objective: Objective,
    n_estimators: usize,
    seed: u64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(objective: Objective, n_estimators: usize, seed: u64) -> Self {
        Self {
            objective,
            n_estimators: n_estimators.max(1),
            seed,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Classification forests average 0/1 leaf means, yielding probabilities
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        let n = x.nrows();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let params = TreeParams {
            max_depth: FOREST_MAX_DEPTH,
            min_samples_leaf: 1,
            min_child_weight: 0.0,
            lambda: 0.0,
            max_features: match self.objective {
                Objective::Regression => None,
                Objective::Classification => Some((x.ncols() as f64).sqrt().ceil() as usize),
            },
        };

        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; n];

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let mut indices: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                RegressionTree::fit(x, &grad, &hess, &mut indices, params, SplitSearch::Exact, &mut rng)
            })
            .collect();
        self.n_features = x.ncols();
        Ok(())
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }
}
