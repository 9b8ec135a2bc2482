//! Integration tests for the prediction API endpoints

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use prediction_server::api::{create_router, AppState};
use predictor_lib::{RegistryConfig, ServiceRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    registry: ServiceRegistry,
    dir: TempDir,
}

async fn setup_test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let registry = ServiceRegistry::new(RegistryConfig {
        model_dir: dir.path().join("models"),
        upload_dir: dir.path().join("uploads"),
        processed_dir: dir.path().join("processed"),
        n_estimators: 3,
    })
    .unwrap();

    let state = Arc::new(AppState::new(registry.clone()));
    let router = create_router(state, &["http://localhost:3000".to_string()]);
    TestApp { router, registry, dir }
}

async fn ready_test_app() -> TestApp {
    let app = setup_test_app().await;
    assert!(app.registry.initialize().all_ready());
    app
}

async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn weight_request() -> Value {
    json!({
        "gestational_age": 39.0,
        "maternal_age": 29,
        "maternal_height": 165.0,
        "maternal_weight": 68.0,
        "previous_pregnancies": 1,
        "smoking_status": 0
    })
}

fn diabetes_request() -> Value {
    json!({
        "age": 34,
        "pregnancy_no": 2,
        "weight": 82.0,
        "height": 160.0,
        "bmi": 32.0,
        "heredity": 1
    })
}

#[tokio::test]
async fn test_root_banner() {
    let app = setup_test_app().await;
    let (status, body) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_readyz_not_ready_before_initialize() {
    let app = setup_test_app().await;
    let (status, body) = send(&app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn test_health_reports_components_and_models() {
    let app = setup_test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["components"]["baby_weight_predictor"]["status"], "unhealthy");
    assert_eq!(body["models"]["diabetes_predictor"]["state"], "uninitialized");

    app.registry.initialize();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["models"]["baby_weight_predictor"]["version"], "1.0.0");

    let (status, _) = send(&app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_predict_before_load_is_503() {
    let app = setup_test_app().await;
    let (status, body) = send(&app, Method::POST, "/predict/diabetes", Some(diabetes_request())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body["detail"],
        "Diabetes model not loaded. Please train or load the model first."
    );
}

#[tokio::test]
async fn test_out_of_range_request_is_422() {
    let app = setup_test_app().await;
    let mut request = weight_request();
    request["gestational_age"] = json!(50.0);

    let (status, body) = send(&app, Method::POST, "/predict/baby-weight", Some(request)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("gestational_age"));
}

#[tokio::test]
async fn test_missing_field_is_rejected_with_detail() {
    let app = setup_test_app().await;
    let (status, body) = send(&app, Method::POST, "/predict/diabetes", Some(json!({ "age": 30 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_predict_baby_weight() {
    let app = ready_test_app().await;
    let (status, body) = send(&app, Method::POST, "/predict/baby-weight", Some(weight_request())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["prediction_type"], "baby_weight");
    assert_eq!(body["model_version"], "1.0.0");

    let grams = body["predicted_weight"].as_f64().unwrap();
    assert!((2000.0..=5000.0).contains(&grams));
    assert_eq!(body["input_data"]["gestation_weeks"], 39.0);
    assert!(body["disclaimer"].as_str().unwrap().contains("professional medical advice"));
}

#[tokio::test]
async fn test_predict_diabetes() {
    let app = ready_test_app().await;
    let (status, body) = send(&app, Method::POST, "/predict/diabetes", Some(diabetes_request())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction_type"], "diabetes");

    let score = body["risk_score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score));
    let expected = if score <= 30.0 {
        "Low Risk"
    } else if score <= 60.0 {
        "Moderate Risk"
    } else {
        "High Risk"
    };
    assert_eq!(body["risk_assessment"], expected);
    assert_eq!(body["confidence"], 0.8);
}

#[tokio::test]
async fn test_train_without_body_uses_synthetic_data() {
    let app = setup_test_app().await;
    let (status, body) = send(&app, Method::POST, "/train/diabetes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["model_version"], "1.0.0");
    assert_eq!(body["report"]["data_source"]["kind"], "synthetic");

    let (status, _) = send(&app, Method::POST, "/predict/diabetes", Some(diabetes_request())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_train_with_wrong_schema_is_400() {
    let app = setup_test_app().await;
    let path = app.dir.path().join("wrong.csv");
    std::fs::write(&path, "x,y\n1,2\n").unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/train/baby-weight",
        Some(json!({ "data_file_path": path })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("bwt"));
}

#[tokio::test]
async fn test_train_with_missing_file_is_500() {
    let app = setup_test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/train/baby-weight",
        Some(json!({ "data_file_path": "/nonexistent/babies.csv" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_evaluate_before_load_is_503() {
    let app = setup_test_app().await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/evaluate/baby-weight",
        Some(json!({ "data_file_path": "eval.csv" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_upload_data_with_empty_directory() {
    let app = setup_test_app().await;
    let (status, body) = send(&app, Method::POST, "/upload-data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No data files found in upload directory");
    assert_eq!(body["processed_files"], json!([]));
}

#[tokio::test]
async fn test_upload_data_processes_files() {
    let app = setup_test_app().await;
    std::fs::write(
        app.dir.path().join("uploads").join("screening.csv"),
        "age,bmi,glucose,family_history,previous_gd,pregnancy_weeks,diabetes_diagnosis\n\
         30,24.5,90,0,0,20,0\n31,25.0,92,1,0,,0\n29,26.1,95,0,1,22,1\n",
    )
    .unwrap();

    let (status, body) = send(&app, Method::POST, "/upload-data", None).await;
    assert_eq!(status, StatusCode::OK);
    let file = &body["processed_files"][0];
    assert_eq!(file["status"], "success");
    assert_eq!(file["data_type"], "diabetes");
    assert_eq!(file["original_records"], 3);

    let (status, summary) = send(&app, Method::GET, "/data/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["uploaded_files"], json!([]));
    assert_eq!(summary["processed_files"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let app = ready_test_app().await;
    send(&app, Method::POST, "/predict/baby-weight", Some(weight_request())).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("maternal_predictor_predictions_total"));
}

#[tokio::test]
async fn test_cors_preflight_allows_credentials() {
    let app = setup_test_app().await;
    let preflight = |origin: &'static str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/predict/diabetes")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    };

    let response = app.router.clone().oneshot(preflight("http://localhost:3000")).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type");

    let response = app.router.clone().oneshot(preflight("http://evil.example")).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
