//! Additive tree boosting
//!
//! One Newton-boosting loop serves three configurations:
//!
//! | flavour      | rounds | rate | depth | λ   | min child weight | bins |
//! |--------------|--------|------|-------|-----|------------------|------|
//! | gradient     | n      | 0.1  | 3     | 0   | 1e-3             | -    |
//! | xgboost      | n      | 0.3  | 6     | 1   | 1                | -    |
//! | histogram    | n      | 0.1  | 5     | 0   | 1e-3             | 255  |
//!
//! Regression uses squared error (`g = F - y`, `h = 1`); classification uses
//! log-loss on the logit (`g = p - y`, `h = p(1-p)`).

use super::tree::{FeatureBins, RegressionTree, SplitSearch, TreeParams};
use super::{sigmoid, Objective};
use crate::error::Result;
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Lower bound on the hessian for log-loss
const MIN_HESSIAN: f64 = 1e-16;

/// Clamp for the class prior when computing the initial logit
const PRIOR_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub tree: TreeParams,
    /// Histogram split search when set
    pub max_bins: Option<usize>,
    pub seed: u64,
}

impl BoostingParams {
    pub fn gradient_boosting(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            learning_rate: 0.1,
            tree: TreeParams {
                max_depth: 3,
                min_samples_leaf: 1,
                min_child_weight: 1e-3,
                lambda: 0.0,
                max_features: None,
            },
            max_bins: None,
            seed,
        }
    }

    pub fn extreme_gradient_boosting(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            learning_rate: 0.3,
            tree: TreeParams {
                max_depth: 6,
                min_samples_leaf: 1,
                min_child_weight: 1.0,
                lambda: 1.0,
                max_features: None,
            },
            max_bins: None,
            seed,
        }
    }

    pub fn histogram_gradient_boosting(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            learning_rate: 0.1,
            tree: TreeParams {
                max_depth: 5,
                min_samples_leaf: 20,
                min_child_weight: 1e-3,
                lambda: 0.0,
                max_features: None,
            },
            max_bins: Some(255),
            seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    objective: Objective,
    params: BoostingParams,
    base_score: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl BoostedTrees {
    pub fn new(objective: Objective, params: BoostingParams) -> Self {
        Self {
            objective,
            params,
            base_score: 0.0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        let n = x.nrows();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let bins = self.params.max_bins.map(|max_bins| FeatureBins::new(x, max_bins));
        let search = match &bins {
            Some(bins) => SplitSearch::Histogram(bins),
            None => SplitSearch::Exact,
        };

        self.base_score = initial_score(self.objective, y);
        let mut raw = vec![self.base_score; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut indices: Vec<usize> = (0..n).collect();
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            for i in 0..n {
                let (g, h) = match self.objective {
                    Objective::Regression => (raw[i] - y[i], 1.0),
                    Objective::Classification => {
                        let p = sigmoid(raw[i]);
                        (p - y[i], (p * (1.0 - p)).max(MIN_HESSIAN))
                    }
                };
                grad[i] = g;
                hess[i] = h;
            }

            let tree = RegressionTree::fit(x, &grad, &hess, &mut indices, self.params.tree, search, &mut rng);
            for (i, row) in x.rows().into_iter().enumerate() {
                raw[i] += self.params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    /// Additive score before the link function
    pub fn raw_score(&self, row: ArrayView1<f64>) -> f64 {
        self.base_score
            + self.params.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let raw = self.raw_score(row);
        match self.objective {
            Objective::Regression => raw,
            Objective::Classification => sigmoid(raw),
        }
    }
}

fn initial_score(objective: Objective, y: ArrayView1<f64>) -> f64 {
    let mean = y.mean().unwrap_or(0.0);
    match objective {
        Objective::Regression => mean,
        Objective::Classification => {
            let p = mean.clamp(PRIOR_EPS, 1.0 - PRIOR_EPS);
            (p / (1.0 - p)).ln()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((200, 2), |(i, j)| ((i * (j + 1)) % 40) as f64);
        let y = x.rows().into_iter().map(|r| 2.0 * r[0] + r[1]).collect();
        (x, y)
    }

    fn mse(model: &BoostedTrees, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        x.rows()
            .into_iter()
            .zip(y.iter())
            .map(|(row, t)| (model.predict_row(row) - t).powi(2))
            .sum::<f64>()
            / y.len() as f64
    }

    #[test]
    fn test_each_flavour_reduces_error() {
        let (x, y) = regression_data();
        let mean = y.mean().unwrap();
        let baseline = y.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / y.len() as f64;

        for params in [
            BoostingParams::gradient_boosting(50, 42),
            BoostingParams::extreme_gradient_boosting(50, 42),
            BoostingParams::histogram_gradient_boosting(50, 42),
        ] {
            let mut model = BoostedTrees::new(Objective::Regression, params);
            model.fit(x.view(), y.view()).unwrap();
            assert!(mse(&model, &x, &y) < baseline * 0.2);
        }
    }

    #[test]
    fn test_classifier_separates_classes() {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..100).map(|i| if i >= 50 { 1.0 } else { 0.0 }).collect();

        let mut model = BoostedTrees::new(
            Objective::Classification,
            BoostingParams::gradient_boosting(30, 42),
        );
        model.fit(x.view(), y.view()).unwrap();

        let low = model.predict_row(array![10.0].view());
        let high = model.predict_row(array![90.0].view());
        assert!(low < 0.5);
        assert!(high > 0.5);
        assert!((0.0..=1.0).contains(&low) && (0.0..=1.0).contains(&high));
    }

    #[test]
    fn test_initial_score() {
        let y = array![0.0, 1.0, 1.0, 1.0];
        assert!((initial_score(Objective::Regression, y.view()) - 0.75).abs() < 1e-12);
        assert!((initial_score(Objective::Classification, y.view()) - 3.0f64.ln()).abs() < 1e-12);

        let all_zero = array![0.0, 0.0];
        assert!(initial_score(Objective::Classification, all_zero.view()).is_finite());
    }

    #[test]
    fn test_zero_rounds_predicts_base_score() {
        let (x, y) = regression_data();
        let mut model = BoostedTrees::new(Objective::Regression, BoostingParams::gradient_boosting(0, 42));
        model.fit(x.view(), y.view()).unwrap();
        let mean = y.mean().unwrap();
        assert!((model.predict_row(x.row(0)) - mean).abs() < 1e-9);
    }
}
