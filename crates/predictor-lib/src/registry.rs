//! Process-wide service context
//!
//! Built once at startup and shared with request handlers. Owns both
//! predictors, the ingestion pipeline and the health registry.

use crate::error::Result;
use crate::health::{components, ComponentHealth, HealthRegistry};
use crate::ingestion::DataIngestionPipeline;
use crate::learners::DEFAULT_ESTIMATORS;
use crate::predictor::{BabyWeightPredictor, DiabetesPredictor, LoadOutcome, PredictorService, TrainingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub model_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub n_estimators: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/saved"),
            upload_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("data/processed"),
            n_estimators: DEFAULT_ESTIMATORS,
        }
    }
}

/// Outcomes of the startup load for both predictors
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub baby_weight: LoadOutcome,
    pub diabetes: LoadOutcome,
}

impl StartupReport {
    pub fn all_ready(&self) -> bool {
        self.baby_weight.is_ready() && self.diabetes.is_ready()
    }
}

#[derive(Clone)]
pub struct ServiceRegistry {
    baby_weight: Arc<BabyWeightPredictor>,
    diabetes: Arc<DiabetesPredictor>,
    pipeline: Arc<DataIngestionPipeline>,
    health: HealthRegistry,
}

impl ServiceRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let training = TrainingConfig::new(&config.model_dir, &config.upload_dir).with_estimators(config.n_estimators);
        let pipeline = DataIngestionPipeline::new(&config.upload_dir, &config.processed_dir)?;
        Ok(Self {
            baby_weight: Arc::new(PredictorService::new(training.clone())),
            diabetes: Arc::new(PredictorService::new(training)),
            pipeline: Arc::new(pipeline),
            health: HealthRegistry::new(),
        })
    }

    pub fn baby_weight(&self) -> &Arc<BabyWeightPredictor> {
        &self.baby_weight
    }

    pub fn diabetes(&self) -> &Arc<DiabetesPredictor> {
        &self.diabetes
    }

    pub fn pipeline(&self) -> &Arc<DataIngestionPipeline> {
        &self.pipeline
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Load or train both predictors. Blocking; may train.
    pub fn initialize(&self) -> StartupReport {
        let report = StartupReport {
            baby_weight: self.baby_weight.load_or_train(),
            diabetes: self.diabetes.load_or_train(),
        };
        info!(
            baby_weight = ?report.baby_weight,
            diabetes = ?report.diabetes,
            "Predictors initialized"
        );
        report
    }

    /// Recompute component health from predictor states and directories
    pub async fn refresh_health(&self) {
        let components = [
            (components::BABY_WEIGHT_PREDICTOR, ComponentHealth::for_predictor(&*self.baby_weight)),
            (components::DIABETES_PREDICTOR, ComponentHealth::for_predictor(&*self.diabetes)),
            (
                components::DATA_PIPELINE,
                ComponentHealth::for_pipeline(self.pipeline.upload_dir(), self.pipeline.processed_dir()),
            ),
        ];
        let models_ready = self.baby_weight.is_ready() && self.diabetes.is_ready();
        self.health.publish(components, models_ready).await;
    }
}
