//! Predictor service: load-or-train lifecycle and inference
//!
//! Each service owns one task's model snapshot. Predictions clone an `Arc`
//! of the current snapshot under a read lock and run against it; training
//! builds a complete new snapshot, persists it, then swaps it in under a
//! write lock. Trainings are serialized by a mutex.

use super::artifact::{version_for, ArtifactStore, ModelMetadata, ModelSnapshot};
use super::features::FeatureScaler;
use super::output::OutputFormatter;
use super::selector::{train_test_split, CandidateScore, ModelSelector, SelectionMetric, TrainTestSplit, TEST_FRACTION};
use super::{to_matrix, PredictionTask};
use crate::dataset::Table;
use crate::error::{Error, Result};
use crate::learners::metrics::{accuracy, mean_absolute_error, r2_score, roc_auc, root_mean_squared_error};
use crate::learners::{EnsembleParams, Objective, DEFAULT_SEED};
use crate::models::PredictionResponse;
use crate::observability::{ServiceMetrics, StructuredLogger};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fewest prepared rows a training run accepts
pub const MIN_TRAINING_ROWS: usize = 10;

/// Where models live, where uploads are looked up, and ensemble sizing
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub model_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub ensemble: EnsembleParams,
    /// Seed for synthetic data and the train/test split
    pub seed: u64,
}

impl TrainingConfig {
    pub fn new(model_dir: impl Into<PathBuf>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            upload_dir: upload_dir.into(),
            ensemble: EnsembleParams::default(),
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.ensemble.n_estimators = n_estimators;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Loading,
    Training,
    Ready,
}

/// Where a training run's data came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum DataSource {
    File(PathBuf),
    Synthetic,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Synthetic => write!(f, "synthetic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub task: String,
    pub model_version: String,
    pub algorithm: String,
    pub metric: SelectionMetric,
    pub score: f64,
    pub leaderboard: Vec<CandidateScore>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub data_source: DataSource,
    pub training_time_seconds: f64,
}

/// Which path `load_or_train` took
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded { version: String },
    Retrained { reason: String, report: TrainingReport },
    Failed { reason: String, error: String },
}

impl LoadOutcome {
    pub fn is_ready(&self) -> bool {
        !matches!(self, LoadOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationMetrics {
    Regression { mae: f64, rmse: f64, r2: f64 },
    Classification { accuracy: f64, roc_auc: Option<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub task: String,
    pub model_version: String,
    pub rows: usize,
    pub metrics: EvaluationMetrics,
}

/// Inference statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_predictions: u64,
    pub fallback_predictions: u64,
    pub trainings: u64,
}

pub struct PredictorService<T: PredictionTask> {
    config: TrainingConfig,
    store: ArtifactStore,
    formatter: OutputFormatter,
    snapshot: RwLock<Option<Arc<ModelSnapshot>>>,
    state: RwLock<ServiceState>,
    training: Mutex<()>,
    prediction_count: AtomicU64,
    fallback_count: AtomicU64,
    training_count: AtomicU64,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
    _task: PhantomData<fn() -> T>,
}

// A poisoned lock still holds a complete value: every write is a single assignment.
fn read<V>(lock: &RwLock<V>) -> RwLockReadGuard<'_, V> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<V>(lock: &RwLock<V>) -> RwLockWriteGuard<'_, V> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl<T: PredictionTask> PredictorService<T> {
    pub fn new(config: TrainingConfig) -> Self {
        let store = ArtifactStore::new(&config.model_dir, T::NAME);
        Self {
            config,
            store,
            formatter: OutputFormatter::new(),
            snapshot: RwLock::new(None),
            state: RwLock::new(ServiceState::Uninitialized),
            training: Mutex::new(()),
            prediction_count: AtomicU64::new(0),
            fallback_count: AtomicU64::new(0),
            training_count: AtomicU64::new(0),
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::new("maternal-predictor"),
            _task: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        T::NAME
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn state(&self) -> ServiceState {
        *read(&self.state)
    }

    pub fn is_ready(&self) -> bool {
        read(&self.snapshot).is_some()
    }

    /// Current (model, scaler, metadata) snapshot
    pub fn snapshot(&self) -> Option<Arc<ModelSnapshot>> {
        read(&self.snapshot).clone()
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.snapshot().map(|s| s.metadata.clone())
    }

    pub fn model_version(&self) -> Option<String> {
        self.snapshot().map(|s| s.metadata.version.clone())
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_predictions: self.prediction_count.load(Ordering::Relaxed),
            fallback_predictions: self.fallback_count.load(Ordering::Relaxed),
            trainings: self.training_count.load(Ordering::Relaxed),
        }
    }

    fn set_state(&self, state: ServiceState) {
        *write(&self.state) = state;
    }

    fn settle_state(&self) {
        let state = if self.is_ready() {
            ServiceState::Ready
        } else {
            ServiceState::Uninitialized
        };
        self.set_state(state);
    }

    fn install(&self, snapshot: ModelSnapshot) {
        self.metrics
            .set_model(T::NAME, snapshot.metadata.revision, snapshot.metadata.score);
        *write(&self.snapshot) = Some(Arc::new(snapshot));
        self.set_state(ServiceState::Ready);
    }

    /// Load persisted artifacts, retraining when they are absent or unusable.
    /// Never fails: the outcome reports which path was taken.
    pub fn load_or_train(&self) -> LoadOutcome {
        self.set_state(ServiceState::Loading);

        let reason = match self.store.load(T::FEATURE_NAMES) {
            Ok(snapshot) => {
                let version = snapshot.metadata.version.clone();
                self.logger
                    .log_model_loaded(T::NAME, &version, &snapshot.metadata.algorithm);
                self.install(snapshot);
                return LoadOutcome::Loaded { version };
            }
            Err(e) => e.to_string(),
        };

        warn!(task = T::NAME, reason = %reason, "Could not load persisted model, retraining");
        match self.train(None) {
            Ok(report) => LoadOutcome::Retrained { reason, report },
            Err(e) => LoadOutcome::Failed {
                reason,
                error: e.to_string(),
            },
        }
    }

    /// Train a fresh snapshot and swap it in.
    ///
    /// Data source order: `data_path`, then the conventional upload file,
    /// then synthetic data. On failure the previous snapshot stays in place.
    pub fn train(&self, data_path: Option<&Path>) -> Result<TrainingReport> {
        let _guard = self.training.lock().unwrap_or_else(|e| e.into_inner());
        self.set_state(ServiceState::Training);
        let start = Instant::now();

        match self.build_snapshot(data_path) {
            Ok((snapshot, mut report)) => {
                report.training_time_seconds = start.elapsed().as_secs_f64();
                self.install(snapshot);
                self.training_count.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .observe_training(T::NAME, report.training_time_seconds, true);
                self.logger.log_model_trained(
                    T::NAME,
                    &report.model_version,
                    &report.algorithm,
                    report.metric.as_str(),
                    report.score,
                    &report.data_source.to_string(),
                    report.training_time_seconds,
                );
                Ok(report)
            }
            Err(e) => {
                self.metrics
                    .observe_training(T::NAME, start.elapsed().as_secs_f64(), false);
                self.logger.log_training_failed(T::NAME, &e.to_string());
                self.settle_state();
                Err(e)
            }
        }
    }

    fn resolve_dataset(&self, data_path: Option<&Path>) -> Result<(Table, DataSource)> {
        if let Some(path) = data_path {
            return Ok((Table::read_csv(path)?, DataSource::File(path.to_path_buf())));
        }
        let upload = self.config.upload_dir.join(T::UPLOAD_FILE);
        if upload.is_file() {
            return Ok((Table::read_csv(&upload)?, DataSource::File(upload)));
        }
        debug!(task = T::NAME, "No training data found, generating synthetic dataset");
        Ok((T::synthetic(self.config.seed)?, DataSource::Synthetic))
    }

    fn build_snapshot(&self, data_path: Option<&Path>) -> Result<(ModelSnapshot, TrainingReport)> {
        let (raw, source) = self.resolve_dataset(data_path)?;
        let prepared = T::prepare(&raw)?;
        let (x, y) = to_matrix(&prepared, T::FEATURE_NAMES, T::TARGET)?;
        if x.nrows() < MIN_TRAINING_ROWS {
            return Err(Error::Training(format!(
                "Need at least {MIN_TRAINING_ROWS} usable rows, got {}",
                x.nrows()
            )));
        }
        info!(task = T::NAME, rows = x.nrows(), source = %source, "Training models");

        let split = train_test_split(
            x.view(),
            y.view(),
            TEST_FRACTION,
            self.config.seed,
            T::OBJECTIVE == Objective::Classification,
        )?;
        let scaler = FeatureScaler::fitted(split.x_train.view())?;
        let scaled = TrainTestSplit {
            x_train: scaler.transform(split.x_train.view())?,
            x_test: scaler.transform(split.x_test.view())?,
            y_train: split.y_train,
            y_test: split.y_test,
        };

        let selection = ModelSelector::new(T::OBJECTIVE, self.config.ensemble).select(&scaled)?;

        let revision = self.snapshot().map_or(0, |s| s.metadata.revision + 1);
        let metadata = ModelMetadata {
            task: T::NAME.to_string(),
            version: version_for(revision),
            revision,
            algorithm: selection.model.name().to_string(),
            metric: selection.metric,
            score: selection.score,
            trained_at: Utc::now(),
            train_rows: scaled.x_train.nrows(),
            test_rows: scaled.x_test.nrows(),
            feature_names: T::FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            leaderboard: selection.leaderboard,
        };
        let snapshot = ModelSnapshot {
            model: selection.model,
            scaler,
            metadata,
        };
        self.store.save(&snapshot)?;

        let report = TrainingReport {
            task: T::NAME.to_string(),
            model_version: snapshot.metadata.version.clone(),
            algorithm: snapshot.metadata.algorithm.clone(),
            metric: snapshot.metadata.metric,
            score: snapshot.metadata.score,
            leaderboard: snapshot.metadata.leaderboard.clone(),
            train_rows: snapshot.metadata.train_rows,
            test_rows: snapshot.metadata.test_rows,
            data_source: source,
            training_time_seconds: 0.0,
        };
        Ok((snapshot, report))
    }

    pub fn predict(&self, request: &T::Request) -> Result<PredictionResponse> {
        let start = Instant::now();
        let result = self.predict_inner(request);
        match &result {
            Ok((response, used_fallback)) => {
                self.prediction_count.fetch_add(1, Ordering::Relaxed);
                if *used_fallback {
                    self.fallback_count.fetch_add(1, Ordering::Relaxed);
                }
                self.metrics
                    .observe_prediction(T::NAME, start.elapsed().as_secs_f64(), *used_fallback);
                self.logger.log_prediction(
                    T::NAME,
                    response.outcome.value(),
                    response.outcome.risk_level().as_str(),
                    *used_fallback,
                    &response.model_version,
                );
            }
            Err(_) => self.metrics.inc_prediction_errors(T::NAME),
        }
        result.map(|(response, _)| response)
    }

    fn predict_inner(&self, request: &T::Request) -> Result<(PredictionResponse, bool)> {
        let features = T::features(request)?;
        let snapshot = self
            .snapshot()
            .ok_or_else(|| Error::NotLoaded(T::LABEL.to_string()))?;

        let scaled = snapshot.scaler.transform_vector(&features)?;
        let raw = snapshot.model.predict_row(scaled.view());
        let interpretation = T::interpret(&self.formatter, raw, request)?;
        if interpretation.used_fallback {
            warn!(task = T::NAME, raw_prediction = raw, "Implausible prediction, used fallback formula");
        }

        let response = PredictionResponse {
            success: true,
            outcome: interpretation.outcome,
            recommendation: interpretation.recommendation.to_string(),
            confidence: T::CONFIDENCE,
            disclaimer: T::DISCLAIMER.to_string(),
            model_version: snapshot.metadata.version.clone(),
            prediction_timestamp: Utc::now(),
            input_data: features,
        };
        Ok((response, interpretation.used_fallback))
    }

    /// Score the current snapshot on an external CSV in the training schema
    pub fn evaluate(&self, path: &Path) -> Result<EvaluationReport> {
        let snapshot = self
            .snapshot()
            .ok_or_else(|| Error::NotLoaded(T::LABEL.to_string()))?;

        let prepared = T::prepare(&Table::read_csv(path)?)?;
        let (x, y) = to_matrix(&prepared, T::FEATURE_NAMES, T::TARGET)?;
        if x.nrows() == 0 {
            return Err(Error::Training("Evaluation data has no usable rows".to_string()));
        }
        let scaled = snapshot.scaler.transform(x.view())?;
        let predictions = snapshot.model.predict(scaled.view());

        let metrics = match T::OBJECTIVE {
            Objective::Regression => EvaluationMetrics::Regression {
                mae: mean_absolute_error(y.view(), predictions.view()),
                rmse: root_mean_squared_error(y.view(), predictions.view()),
                r2: r2_score(y.view(), predictions.view()),
            },
            Objective::Classification => {
                let labels = snapshot.model.predict_labels(scaled.view());
                EvaluationMetrics::Classification {
                    accuracy: accuracy(y.view(), labels.view()),
                    roc_auc: roc_auc(y.view(), predictions.view()),
                }
            }
        };

        Ok(EvaluationReport {
            task: T::NAME.to_string(),
            model_version: snapshot.metadata.version.clone(),
            rows: x.nrows(),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BabyWeightRequest, DiabetesRequest, PredictionOutcome, RiskAssessment};
    use crate::predictor::{BabyWeightPredictor, DiabetesPredictor, PredictionTask};
    use crate::predictor::{BabyWeightTask, DiabetesTask};
    use std::fs;
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> TrainingConfig {
        TrainingConfig::new(dir.path().join("models"), dir.path().join("uploads")).with_estimators(5)
    }

    fn weight_request() -> BabyWeightRequest {
        BabyWeightRequest {
            gestational_age: 40.0,
            maternal_age: 28,
            maternal_height: 165.0,
            maternal_weight: 65.0,
            previous_pregnancies: 0,
            smoking_status: 0,
        }
    }

    fn diabetes_request() -> DiabetesRequest {
        DiabetesRequest {
            age: 38,
            pregnancy_no: 2,
            weight: 95.0,
            height: 155.0,
            bmi: 39.5,
            heredity: 1,
        }
    }

    #[test]
    fn test_predict_before_load_is_not_loaded() {
        let dir = TempDir::new().unwrap();
        let service = BabyWeightPredictor::new(config(&dir));
        assert_eq!(service.state(), ServiceState::Uninitialized);
        assert!(matches!(service.predict(&weight_request()), Err(Error::NotLoaded(_))));
    }

    #[test]
    fn test_validation_precedes_not_loaded() {
        let dir = TempDir::new().unwrap();
        let service = BabyWeightPredictor::new(config(&dir));
        let mut request = weight_request();
        request.gestational_age = 10.0;
        assert!(matches!(service.predict(&request), Err(Error::Validation(_))));
    }

    #[test]
    fn test_load_or_train_then_load() {
        let dir = TempDir::new().unwrap();
        let first = BabyWeightPredictor::new(config(&dir));
        let outcome = first.load_or_train();
        match &outcome {
            LoadOutcome::Retrained { report, .. } => {
                assert_eq!(report.model_version, "1.0.0");
                assert_eq!(report.data_source, DataSource::Synthetic);
                assert_eq!(report.leaderboard.len(), 4);
                assert_eq!(report.train_rows + report.test_rows, 2000);
            }
            other => panic!("expected retrain, got {other:?}"),
        }
        assert_eq!(first.state(), ServiceState::Ready);
        assert!(first.artifacts().model_path().exists());
        assert!(first.artifacts().scaler_path().exists());

        let second = BabyWeightPredictor::new(config(&dir));
        assert_eq!(
            second.load_or_train(),
            LoadOutcome::Loaded {
                version: "1.0.0".to_string()
            }
        );

        let a = first.predict(&weight_request()).unwrap();
        let b = second.predict(&weight_request()).unwrap();
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(second.stats().total_predictions, 1);
    }

    #[test]
    fn test_weight_prediction_in_range() {
        let dir = TempDir::new().unwrap();
        let service = BabyWeightPredictor::new(config(&dir));
        assert!(service.load_or_train().is_ready());

        let response = service.predict(&weight_request()).unwrap();
        assert!(response.success);
        assert_eq!(response.confidence, 0.85);
        assert_eq!(response.model_version, "1.0.0");
        match response.outcome {
            PredictionOutcome::BabyWeight {
                predicted_weight,
                weight_category,
                ..
            } => {
                assert!((2000.0..=5000.0).contains(&predicted_weight));
                assert_eq!(response.outcome.risk_level(), weight_category.risk_level());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(response.input_data.names(), BabyWeightTask::FEATURE_NAMES);
    }

    #[test]
    fn test_diabetes_prediction_bucket_matches_score() {
        let dir = TempDir::new().unwrap();
        let service = DiabetesPredictor::new(config(&dir));
        match service.load_or_train() {
            LoadOutcome::Retrained { report, .. } => {
                assert_eq!(report.metric, SelectionMetric::RocAuc);
                assert_eq!(report.leaderboard.len(), 5);
            }
            other => panic!("expected retrain, got {other:?}"),
        }

        let response = service.predict(&diabetes_request()).unwrap();
        assert_eq!(response.confidence, 0.80);
        match response.outcome {
            PredictionOutcome::Diabetes {
                risk_score,
                risk_assessment,
                ..
            } => {
                assert!((0.0..=100.0).contains(&risk_score));
                assert_eq!(response.outcome.risk_level(), risk_assessment.risk_level());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_retrain_bumps_version() {
        let dir = TempDir::new().unwrap();
        let service = DiabetesPredictor::new(config(&dir));
        service.load_or_train();
        let report = service.train(None).unwrap();
        assert_eq!(report.model_version, "1.0.1");
        assert_eq!(service.model_version().as_deref(), Some("1.0.1"));
        assert_eq!(service.stats().trainings, 2);

        let reloaded = DiabetesPredictor::new(config(&dir));
        assert_eq!(
            reloaded.load_or_train(),
            LoadOutcome::Loaded {
                version: "1.0.1".to_string()
            }
        );
    }

    #[test]
    fn test_corrupt_artifact_retrains() {
        let dir = TempDir::new().unwrap();
        let service = DiabetesPredictor::new(config(&dir));
        service.load_or_train();
        fs::write(service.artifacts().scaler_path(), b"garbage").unwrap();

        let again = DiabetesPredictor::new(config(&dir));
        assert!(matches!(again.load_or_train(), LoadOutcome::Retrained { .. }));
    }

    #[test]
    fn test_failed_training_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let service = BabyWeightPredictor::new(config(&dir));
        service.load_or_train();

        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "case,bwt\n1,3000\n").unwrap();
        assert!(matches!(service.train(Some(&bad)), Err(Error::Schema { .. })));
        assert_eq!(service.state(), ServiceState::Ready);
        assert_eq!(service.model_version().as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_too_few_rows_is_training_error() {
        let dir = TempDir::new().unwrap();
        let service = BabyWeightPredictor::new(config(&dir));
        let small = dir.path().join("small.csv");
        fs::write(
            &small,
            "case,bwt,gestation,parity,age,height,weight,smoke\n1,3400,280,0,27,160,60,0\n",
        )
        .unwrap();

        assert!(matches!(service.train(Some(&small)), Err(Error::Training(_))));
        assert_eq!(service.state(), ServiceState::Uninitialized);
        assert!(matches!(
            service.load_or_train(),
            LoadOutcome::Retrained { .. }
        ));
    }

    #[test]
    fn test_upload_file_is_preferred_over_synthetic() {
        let dir = TempDir::new().unwrap();
        let uploads = dir.path().join("uploads");
        fs::create_dir_all(&uploads).unwrap();
        let table = DiabetesTask::synthetic(7).unwrap();
        table.write_csv(&uploads.join(DiabetesTask::UPLOAD_FILE)).unwrap();

        let service = DiabetesPredictor::new(config(&dir));
        let report = service.train(None).unwrap();
        assert_eq!(report.data_source, DataSource::File(uploads.join("GestationalDiabetes.csv")));
    }

    #[test]
    fn test_evaluate_reports_metrics() {
        let dir = TempDir::new().unwrap();
        let service = BabyWeightPredictor::new(config(&dir));
        let eval = dir.path().join("eval.csv");
        BabyWeightTask::synthetic(9).unwrap().write_csv(&eval).unwrap();

        assert!(matches!(service.evaluate(&eval), Err(Error::NotLoaded(_))));
        service.load_or_train();

        let report = service.evaluate(&eval).unwrap();
        assert_eq!(report.rows, 2000);
        match report.metrics {
            EvaluationMetrics::Regression { mae, rmse, .. } => {
                assert!(mae > 0.0);
                assert!(rmse >= mae);
            }
            other => panic!("unexpected metrics {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_classification() {
        let dir = TempDir::new().unwrap();
        let service = DiabetesPredictor::new(config(&dir));
        service.load_or_train();
        let eval = dir.path().join("eval.csv");
        DiabetesTask::synthetic(11).unwrap().write_csv(&eval).unwrap();

        match service.evaluate(&eval).unwrap().metrics {
            EvaluationMetrics::Classification { accuracy, roc_auc } => {
                assert!((0.0..=1.0).contains(&accuracy));
                assert!(roc_auc.is_some());
            }
            other => panic!("unexpected metrics {other:?}"),
        }
    }

    fn revision_of(version: &str) -> u64 {
        version.rsplit('.').next().and_then(|r| r.parse().ok()).unwrap()
    }

    #[test]
    fn test_concurrent_training_and_prediction() {
        let dir = TempDir::new().unwrap();
        let service = DiabetesPredictor::new(config(&dir));
        assert!(service.load_or_train().is_ready());

        let done = AtomicBool::new(false);
        let (seen, mut trained) = std::thread::scope(|scope| {
            let service = &service;
            let done = &done;

            let reader = scope.spawn(move || {
                let mut seen = Vec::new();
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let snapshot = service.snapshot().unwrap();
                    assert_eq!(snapshot.metadata.version, version_for(snapshot.metadata.revision));
                    assert_eq!(snapshot.scaler.n_features(), snapshot.model.n_features());
                    seen.push(service.predict(&diabetes_request()).unwrap().model_version);
                    if finished {
                        return seen;
                    }
                }
            });
            let first = scope.spawn(move || service.train(None).unwrap().model_version);
            let second = scope.spawn(move || service.train(None).unwrap().model_version);

            let trained = vec![first.join().unwrap(), second.join().unwrap()];
            done.store(true, Ordering::Release);
            (reader.join().unwrap(), trained)
        });

        trained.sort();
        assert_eq!(trained, vec!["1.0.1".to_string(), "1.0.2".to_string()]);
        assert_eq!(service.model_version().as_deref(), Some("1.0.2"));
        assert_eq!(service.stats().trainings, 3);

        let allowed = ["1.0.0", "1.0.1", "1.0.2"];
        assert!(seen.iter().all(|v| allowed.contains(&v.as_str())), "{seen:?}");
        assert!(seen
            .windows(2)
            .all(|pair| revision_of(&pair[0]) <= revision_of(&pair[1])));
        assert_eq!(seen.last().map(String::as_str), Some("1.0.2"));

        let reloaded = DiabetesPredictor::new(config(&dir));
        assert_eq!(
            reloaded.load_or_train(),
            LoadOutcome::Loaded {
                version: "1.0.2".to_string()
            }
        );
    }
}
