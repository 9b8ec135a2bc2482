//! Native regression and classification learners
//!
//! The candidate pool used by the model selector: a random forest, three
//! gradient-boosting flavours sharing one tree learner, and an L2-regularized
//! logistic regression. All learners are deterministic for a fixed seed and
//! serialize with serde so a fitted model can be persisted as-is.

mod boosting;
mod forest;
mod logistic;
pub mod metrics;
mod tree;

pub use boosting::{BoostedTrees, BoostingParams};
pub use forest::RandomForest;
pub use logistic::LogisticRegression;
pub use tree::{FeatureBins, Node, RegressionTree, SplitSearch, TreeParams};

use crate::error::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Default number of trees / boosting rounds per ensemble
pub const DEFAULT_ESTIMATORS: usize = 100;

/// Default seed for every stochastic step of training
pub const DEFAULT_SEED: u64 = 42;

/// Positive-class probability at or above which a row is labelled 1
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Threshold positive-class probabilities into 0/1 labels
pub fn to_labels(probabilities: ArrayView1<f64>) -> Array1<f64> {
    probabilities.mapv(|p| if p >= DECISION_THRESHOLD { 1.0 } else { 0.0 })
}

/// Learning objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Real-valued target; predictions are target values
    Regression,
    /// Binary 0/1 target; predictions are positive-class probabilities
    Classification,
}

/// Ensemble sizing shared by every candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleParams {
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_ESTIMATORS,
            seed: DEFAULT_SEED,
        }
    }
}

/// A candidate model; unfitted until [`Model::fit`] succeeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Model {
    RandomForest(RandomForest),
    GradientBoosting(BoostedTrees),
    #[serde(rename = "xgboost")]
    ExtremeGradientBoosting(BoostedTrees),
    HistGradientBoosting(BoostedTrees),
    LogisticRegression(LogisticRegression),
}

impl Model {
    /// The fixed candidate pool, in selection order
    pub fn candidates(objective: Objective, params: EnsembleParams) -> Vec<Model> {
        let EnsembleParams { n_estimators, seed } = params;
        let mut pool = vec![
            Model::RandomForest(RandomForest::new(objective, n_estimators, seed)),
            Model::GradientBoosting(BoostedTrees::new(
                objective,
                BoostingParams::gradient_boosting(n_estimators, seed),
            )),
            Model::ExtremeGradientBoosting(BoostedTrees::new(
                objective,
                BoostingParams::extreme_gradient_boosting(n_estimators, seed),
            )),
            Model::HistGradientBoosting(BoostedTrees::new(
                objective,
                BoostingParams::histogram_gradient_boosting(n_estimators, seed),
            )),
        ];
        if objective == Objective::Classification {
            pool.push(Model::LogisticRegression(LogisticRegression::default()));
        }
        pool
    }

    /// Stable algorithm identifier
    pub fn name(&self) -> &'static str {
        match self {
            Model::RandomForest(_) => "random_forest",
            Model::GradientBoosting(_) => "gradient_boosting",
            Model::ExtremeGradientBoosting(_) => "xgboost",
            Model::HistGradientBoosting(_) => "hist_gradient_boosting",
            Model::LogisticRegression(_) => "logistic_regression",
        }
    }

    pub fn objective(&self) -> Objective {
        match self {
            Model::RandomForest(m) => m.objective(),
            Model::GradientBoosting(m)
            | Model::ExtremeGradientBoosting(m)
            | Model::HistGradientBoosting(m) => m.objective(),
            Model::LogisticRegression(_) => Objective::Classification,
        }
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        match self {
            Model::RandomForest(m) => m.fit(x, y),
            Model::GradientBoosting(m)
            | Model::ExtremeGradientBoosting(m)
            | Model::HistGradientBoosting(m) => m.fit(x, y),
            Model::LogisticRegression(m) => m.fit(x, y),
        }
    }

    /// Target value (regression) or positive-class probability (classification)
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            Model::RandomForest(m) => m.predict_row(row),
            Model::GradientBoosting(m)
            | Model::ExtremeGradientBoosting(m)
            | Model::HistGradientBoosting(m) => m.predict_row(row),
            Model::LogisticRegression(m) => m.predict_row(row),
        }
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    /// Hard 0/1 labels at [`DECISION_THRESHOLD`]
    pub fn predict_labels(&self, x: ArrayView2<f64>) -> Array1<f64> {
        to_labels(self.predict(x).view())
    }

    /// Number of input features the model was fitted on
    pub fn n_features(&self) -> usize {
        match self {
            Model::RandomForest(m) => m.n_features(),
            Model::GradientBoosting(m)
            | Model::ExtremeGradientBoosting(m)
            | Model::HistGradientBoosting(m) => m.n_features(),
            Model::LogisticRegression(m) => m.n_features(),
        }
    }
}

fn check_training_data(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(Error::Training("Empty training matrix".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(Error::Training(format!(
            "Feature rows ({}) and targets ({}) differ",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(Error::Training("Training data contains non-finite values".to_string()));
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
