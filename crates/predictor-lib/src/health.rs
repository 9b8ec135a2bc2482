//! Component health derived from predictor lifecycle and pipeline directories
//!
//! The service registry recomputes every component at once and publishes the
//! result here; `/health` and `/readyz` read the last published view.

use crate::predictor::{PredictionTask, PredictorService, ServiceState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component names for health tracking
pub mod components {
    pub const BABY_WEIGHT_PREDICTOR: &str = "baby_weight_predictor";
    pub const DIABETES_PREDICTOR: &str = "diabetes_predictor";
    pub const DATA_PIPELINE: &str = "data_pipeline";

    pub const ALL: &[&str] = &[BABY_WEIGHT_PREDICTOR, DIABETES_PREDICTOR, DATA_PIPELINE];
}

/// Ordered by severity; the service reports its worst component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Serving from the previous model while a retrain runs
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Map a predictor's lifecycle state onto a health status.
    /// A predictor with an installed model keeps serving while it retrains.
    pub fn for_predictor_state(state: ServiceState, has_model: bool, label: &str) -> Self {
        match (state, has_model) {
            (ServiceState::Ready, true) => Self::new(ComponentStatus::Healthy, None),
            (ServiceState::Training, true) => {
                Self::new(ComponentStatus::Degraded, Some("Retraining in progress".to_string()))
            }
            (ServiceState::Training, false) | (ServiceState::Loading, _) => {
                Self::new(ComponentStatus::Unhealthy, Some("Model is being prepared".to_string()))
            }
            _ => Self::new(ComponentStatus::Unhealthy, Some(format!("{label} model not loaded"))),
        }
    }

    pub fn for_predictor<T: PredictionTask>(service: &PredictorService<T>) -> Self {
        Self::for_predictor_state(service.state(), service.is_ready(), T::LABEL)
    }

    /// The pipeline is usable while both of its directories exist
    pub fn for_pipeline(upload_dir: &Path, processed_dir: &Path) -> Self {
        if upload_dir.is_dir() && processed_dir.is_dir() {
            Self::new(ComponentStatus::Healthy, None)
        } else {
            Self::new(
                ComponentStatus::Unhealthy,
                Some("Upload or processed directory is missing".to_string()),
            )
        }
    }
}

/// Body of `/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    fn from_components(components: BTreeMap<String, ComponentHealth>) -> Self {
        let status = components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        Self { status, components }
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct Published {
    components: BTreeMap<String, ComponentHealth>,
    models_ready: bool,
}

/// Last published health of every component
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    published: Arc<RwLock<Published>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all component health and the model readiness flag in one step
    pub async fn publish<I>(&self, components: I, models_ready: bool)
    where
        I: IntoIterator<Item = (&'static str, ComponentHealth)>,
    {
        let components = components
            .into_iter()
            .map(|(name, health)| (name.to_string(), health))
            .collect();
        *self.published.write().await = Published {
            components,
            models_ready,
        };
    }

    pub async fn health(&self) -> HealthResponse {
        HealthResponse::from_components(self.published.read().await.components.clone())
    }

    /// Ready once both models are installed and no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let published = self.published.read().await;
        let reason = if !published.models_ready {
            Some("Models not yet initialized")
        } else if published.components.values().any(|c| !c.status.is_operational()) {
            Some("A component is unhealthy")
        } else {
            None
        };
        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}
