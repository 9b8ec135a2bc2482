//! Model lifecycle: preparation, selection, persistence and inference

mod artifact;
mod baby_weight;
mod diabetes;
mod features;
mod inference;
mod output;
mod selector;

pub use artifact::{compute_checksum, version_for, ArtifactStore, ModelMetadata, ModelSnapshot};
pub use baby_weight::BabyWeightTask;
pub use diabetes::DiabetesTask;
pub use features::{FeatureScaler, FeatureVector};
pub use inference::{
    DataSource, EvaluationMetrics, EvaluationReport, InferenceStats, LoadOutcome, PredictorService,
    ServiceState, TrainingConfig, TrainingReport, MIN_TRAINING_ROWS,
};
pub use output::{fallback_weight, Interpretation, OutputConfig, OutputFormatter};
pub use selector::{
    holdout_score, train_test_split, CandidateScore, ModelSelector, Selection, SelectionMetric, TrainTestSplit,
    TEST_FRACTION,
};

use crate::dataset::Table;
use crate::error::{Error, Result};
use crate::learners::Objective;
use ndarray::{Array1, Array2};

pub type BabyWeightPredictor = PredictorService<BabyWeightTask>;
pub type DiabetesPredictor = PredictorService<DiabetesTask>;

/// One prediction task: its schema, data preparation and output handling
pub trait PredictionTask: Send + Sync + 'static {
    type Request: Send + Sync;

    /// Identifier used for artifact names, logs and metrics
    const NAME: &'static str;
    /// Human-readable name used in error messages
    const LABEL: &'static str;
    const OBJECTIVE: Objective;
    /// Model input order; fixed at scaler-fit time
    const FEATURE_NAMES: &'static [&'static str];
    const TARGET: &'static str;
    /// Columns a raw training table must contain
    const REQUIRED_COLUMNS: &'static [&'static str];
    /// Conventional file name looked up in the upload directory
    const UPLOAD_FILE: &'static str;
    const CONFIDENCE: f64;
    const DISCLAIMER: &'static str;

    /// Synthetic training table with the raw training schema
    fn synthetic(seed: u64) -> Result<Table>;

    /// Raw table → numeric table of `FEATURE_NAMES` followed by `TARGET`
    fn prepare(table: &Table) -> Result<Table>;

    /// Validate a request and build its feature vector
    fn features(request: &Self::Request) -> Result<FeatureVector>;

    fn interpret(formatter: &OutputFormatter, raw: f64, request: &Self::Request) -> Result<Interpretation>;
}

/// Shared preparation passes: drop incomplete rows, check the schema,
/// coerce required columns to numbers, drop incomplete rows again.
pub(crate) fn clean_required(table: &Table, required: &[&str]) -> Result<Table> {
    let table = table.drop_missing_rows()?;
    table.require_columns(required)?;
    table.coerce_numeric(required)?.drop_missing_rows()
}

/// Split a prepared table into a feature matrix and target vector
pub(crate) fn to_matrix(table: &Table, features: &[&str], target: &str) -> Result<(Array2<f64>, Array1<f64>)> {
    let mut wanted: Vec<&str> = features.to_vec();
    wanted.push(target);
    table.require_columns(&wanted)?;
    let indices: Vec<usize> = wanted.iter().filter_map(|name| table.column_index(name)).collect();

    let n = table.n_rows();
    let d = features.len();
    let mut x = Array2::<f64>::zeros((n, d));
    let mut y = Array1::<f64>::zeros(n);
    for (i, row) in table.rows().iter().enumerate() {
        for (j, &idx) in indices.iter().enumerate() {
            let value = row[idx].as_f64().ok_or_else(|| {
                Error::Training(format!("Non-numeric value in column '{}' at row {i}", wanted[j]))
            })?;
            if j < d {
                x[[i, j]] = value;
            } else {
                y[i] = value;
            }
        }
    }
    Ok((x, y))
}
