//! HTTP API for predictions, training, ingestion, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use predictor_lib::{
    health::ComponentStatus,
    models::{BabyWeightRequest, DiabetesRequest, EvaluateRequest, TrainRequest, UploadRequest},
    predictor::{PredictionTask, PredictorService},
    Error, ServiceRegistry,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinError;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const SERVICE_NAME: &str = "Maternal Health Prediction API";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: ServiceRegistry,
}

impl AppState {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }
}

/// Error returned by handlers, rendered as `{"detail": "..."}`
#[derive(Debug)]
pub enum ApiError {
    Library(Error),
    Body(JsonRejection),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Library(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        ApiError::Internal(format!("Background task failed: {err}"))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Library(Error::NotLoaded(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Library(Error::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Library(Error::Schema { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Library(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Body(rejection) => rejection.status(),
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Library(err) => err.to_string(),
            ApiError::Body(rejection) => rejection.body_text(),
            ApiError::Internal(message) => message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();
        if status.is_server_error() {
            error!(status = status.as_u16(), detail = %detail, "Request failed");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": SERVICE_NAME,
        "status": "running",
        "version": SERVICE_VERSION,
    }))
}

#[derive(Serialize)]
struct ModelStatus {
    state: predictor_lib::predictor::ServiceState,
    version: Option<String>,
    algorithm: Option<String>,
    stats: predictor_lib::predictor::InferenceStats,
}

fn model_status<T: PredictionTask>(service: &PredictorService<T>) -> ModelStatus {
    let metadata = service.metadata();
    ModelStatus {
        state: service.state(),
        version: metadata.as_ref().map(|m| m.version.clone()),
        algorithm: metadata.map(|m| m.algorithm),
        stats: service.stats(),
    }
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = &state.registry;
    registry.refresh_health().await;
    let health = registry.health().health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = json!({
        "status": health.status,
        "components": health.components,
        "models": {
            "baby_weight_predictor": model_status(registry.baby_weight()),
            "diabetes_predictor": model_status(registry.diabetes()),
        },
    });
    (status_code, Json(body))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.registry.refresh_health().await;
    let readiness = state.registry.health().readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Internal(format!("Failed to encode metrics: {e}")))?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

async fn predict_baby_weight(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BabyWeightRequest>, JsonRejection>,
) -> ApiResult<predictor_lib::PredictionResponse> {
    let Json(request) = payload?;
    Ok(Json(state.registry.baby_weight().predict(&request)?))
}

async fn predict_diabetes(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DiabetesRequest>, JsonRejection>,
) -> ApiResult<predictor_lib::PredictionResponse> {
    let Json(request) = payload?;
    Ok(Json(state.registry.diabetes().predict(&request)?))
}

/// Retrain on the blocking pool, then refresh component health
async fn train_task<T: PredictionTask>(
    state: &AppState,
    service: Arc<PredictorService<T>>,
    body: Option<Json<TrainRequest>>,
) -> ApiResult<serde_json::Value> {
    let path = body.and_then(|Json(b)| b.data_file_path).map(PathBuf::from);
    info!(task = T::NAME, data_file_path = ?path, "Starting model training");

    let report = tokio::task::spawn_blocking(move || service.train(path.as_deref())).await??;
    state.registry.refresh_health().await;

    Ok(Json(json!({
        "message": "Model training completed successfully",
        "report": report,
    })))
}

async fn train_baby_weight(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TrainRequest>>,
) -> ApiResult<serde_json::Value> {
    let service = Arc::clone(state.registry.baby_weight());
    train_task(&state, service, body).await
}

async fn train_diabetes(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TrainRequest>>,
) -> ApiResult<serde_json::Value> {
    let service = Arc::clone(state.registry.diabetes());
    train_task(&state, service, body).await
}

async fn evaluate_task<T: PredictionTask>(
    service: Arc<PredictorService<T>>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> ApiResult<predictor_lib::predictor::EvaluationReport> {
    let Json(request) = payload?;
    let path = PathBuf::from(request.data_file_path);
    let report = tokio::task::spawn_blocking(move || service.evaluate(&path)).await??;
    Ok(Json(report))
}

async fn evaluate_baby_weight(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> ApiResult<predictor_lib::predictor::EvaluationReport> {
    evaluate_task(Arc::clone(state.registry.baby_weight()), payload).await
}

async fn evaluate_diabetes(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> ApiResult<predictor_lib::predictor::EvaluationReport> {
    evaluate_task(Arc::clone(state.registry.diabetes()), payload).await
}

async fn upload_data(
    State(state): State<Arc<AppState>>,
    body: Option<Json<UploadRequest>>,
) -> ApiResult<predictor_lib::ingestion::BatchOutcome> {
    let path = body.and_then(|Json(b)| b.file_path).map(PathBuf::from);
    let pipeline = Arc::clone(state.registry.pipeline());
    let batch = tokio::task::spawn_blocking(move || pipeline.process_pending(path.as_deref())).await??;
    Ok(Json(batch))
}

async fn data_summary(State(state): State<Arc<AppState>>) -> ApiResult<predictor_lib::ingestion::DataSummary> {
    Ok(Json(state.registry.pipeline().summary()?))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        // Credentialed CORS forbids a wildcard header list
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/predict/baby-weight", post(predict_baby_weight))
        .route("/predict/diabetes", post(predict_diabetes))
        .route("/train/baby-weight", post(train_baby_weight))
        .route("/train/diabetes", post(train_diabetes))
        .route("/evaluate/baby-weight", post(evaluate_baby_weight))
        .route("/evaluate/diabetes", post(evaluate_diabetes))
        .route("/upload-data", post(upload_data))
        .route("/data/summary", get(data_summary))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve<F>(addr: &str, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
