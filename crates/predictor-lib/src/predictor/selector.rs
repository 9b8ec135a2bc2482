//! Best-of-N model selection on a held-out split

use crate::error::{Error, Result};
use crate::learners::metrics::{r2_score, roc_auc};
use crate::learners::{to_labels, EnsembleParams, Model, Objective};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Fraction of rows held out for scoring
pub const TEST_FRACTION: f64 = 0.2;

/// Metric used to rank candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMetric {
    R2,
    RocAuc,
}

impl SelectionMetric {
    pub fn for_objective(objective: Objective) -> Self {
        match objective {
            Objective::Regression => SelectionMetric::R2,
            Objective::Classification => SelectionMetric::RocAuc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMetric::R2 => "r2",
            SelectionMetric::RocAuc => "roc_auc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub algorithm: String,
    pub score: f64,
    pub fit_ms: u64,
}

/// Winning model plus the scores of every candidate
#[derive(Debug, Clone)]
pub struct Selection {
    pub model: Model,
    pub metric: SelectionMetric,
    pub score: f64,
    pub leaderboard: Vec<CandidateScore>,
}

#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

/// Seeded shuffle split; with `stratify` each label keeps its proportion
pub fn train_test_split(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    test_fraction: f64,
    seed: u64,
    stratify: bool,
) -> Result<TrainTestSplit> {
    let n = x.nrows();
    let mut rng = StdRng::seed_from_u64(seed);

    let (mut train_idx, mut test_idx) = if stratify {
        let mut labels: Vec<f64> = y.to_vec();
        labels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        labels.dedup();

        let mut train = Vec::new();
        let mut test = Vec::new();
        for label in labels {
            let mut members: Vec<usize> = (0..n).filter(|&i| y[i] == label).collect();
            members.shuffle(&mut rng);
            let mut n_test = (members.len() as f64 * test_fraction).round() as usize;
            if members.len() >= 2 {
                n_test = n_test.clamp(1, members.len() - 1);
            }
            test.extend_from_slice(&members[..n_test]);
            train.extend_from_slice(&members[n_test..]);
        }
        (train, test)
    } else {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        let n_test = (n as f64 * test_fraction).ceil() as usize;
        let train = indices.split_off(n_test.min(n));
        (train, indices)
    };

    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(Error::Training(format!(
            "Cannot split {n} rows into non-empty train and test sets"
        )));
    }
    train_idx.sort_unstable();
    test_idx.sort_unstable();

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_idx),
        y_train: y.select(Axis(0), &train_idx),
        x_test: x.select(Axis(0), &test_idx),
        y_test: y.select(Axis(0), &test_idx),
    })
}

/// Trains every candidate on the same split and keeps the best scorer
#[derive(Debug, Clone)]
pub struct ModelSelector {
    objective: Objective,
    params: EnsembleParams,
}

impl ModelSelector {
    pub fn new(objective: Objective, params: EnsembleParams) -> Self {
        Self { objective, params }
    }

    pub fn metric(&self) -> SelectionMetric {
        SelectionMetric::for_objective(self.objective)
    }

    /// Ties keep the earliest candidate. Any candidate failure aborts selection.
    pub fn select(&self, split: &TrainTestSplit) -> Result<Selection> {
        let metric = self.metric();
        let mut best: Option<(Model, f64)> = None;
        let mut leaderboard = Vec::new();

        for mut candidate in Model::candidates(self.objective, self.params) {
            let start = Instant::now();
            candidate
                .fit(split.x_train.view(), split.y_train.view())
                .map_err(|e| Error::Training(format!("{} failed: {e}", candidate.name())))?;
            let fit_ms = start.elapsed().as_millis() as u64;

            let score = self.score(&candidate, split)?;
            debug!(
                algorithm = candidate.name(),
                metric = metric.as_str(),
                score,
                fit_ms,
                "Candidate scored"
            );
            leaderboard.push(CandidateScore {
                algorithm: candidate.name().to_string(),
                score,
                fit_ms,
            });

            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((candidate, score));
            }
        }

        let (model, score) =
            best.ok_or_else(|| Error::Training("No candidate models configured".to_string()))?;
        info!(
            algorithm = model.name(),
            metric = metric.as_str(),
            score,
            "Selected best model"
        );

        Ok(Selection {
            model,
            metric,
            score,
            leaderboard,
        })
    }

    fn score(&self, model: &Model, split: &TrainTestSplit) -> Result<f64> {
        let predictions = model.predict(split.x_test.view());
        holdout_score(self.metric(), split.y_test.view(), predictions.view())
    }
}

/// Score raw held-out predictions for ranking. Classification is ranked by
/// ROC-AUC over the thresholded labels, not the probabilities.
pub fn holdout_score(metric: SelectionMetric, y_true: ArrayView1<f64>, predictions: ArrayView1<f64>) -> Result<f64> {
    match metric {
        SelectionMetric::R2 => Ok(r2_score(y_true, predictions)),
        SelectionMetric::RocAuc => {
            let labels = to_labels(predictions);
            roc_auc(y_true, labels.view()).ok_or_else(|| {
                Error::Training("Held-out split contains a single class; ROC-AUC undefined".to_string())
            })
        }
    }
}
