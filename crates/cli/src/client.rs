//! API client for the prediction service

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Training can take minutes on large files
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// API client for the prediction service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        self.send(self.client.get(url)).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        self.send(self.client.post(url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to send request")?;
        let response = check_status(response).await?;
        response.json().await.context("Failed to parse response")
    }
}

/// Turn a non-2xx response into an error carrying the server's `detail`
async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);
    anyhow::bail!("API error ({}): {}", status, detail)
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BabyWeightRequest {
    pub gestational_age: f64,
    pub maternal_age: u32,
    pub maternal_height: f64,
    pub maternal_weight: f64,
    pub previous_pregnancies: u32,
    pub smoking_status: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiabetesRequest {
    pub age: u32,
    pub pregnancy_no: u32,
    pub weight: f64,
    pub height: f64,
    pub bmi: f64,
    pub heredity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub success: bool,
    pub prediction_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<String>,
    pub risk_level: String,
    pub recommendation: String,
    pub confidence: f64,
    pub disclaimer: String,
    pub model_version: String,
    pub prediction_timestamp: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataFileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub algorithm: String,
    pub score: f64,
    pub fit_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub task: String,
    pub model_version: String,
    pub algorithm: String,
    pub metric: String,
    pub score: f64,
    pub leaderboard: Vec<CandidateScore>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub training_time_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    pub message: String,
    pub report: TrainingReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub task: String,
    pub model_version: String,
    pub rows: usize,
    /// `mae`/`rmse`/`r2` or `accuracy`/`roc_auc`
    pub metrics: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub status: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_records: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_records: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub processed_files: Vec<FileResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSummary {
    pub upload_directory: String,
    pub processed_directory: String,
    pub uploaded_files: Vec<String>,
    pub processed_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub state: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub algorithm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: BTreeMap<String, ComponentInfo>,
    pub models: BTreeMap<String, ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_parses_health() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "status": "healthy",
                    "components": { "data_pipeline": { "status": "healthy", "last_check_timestamp": 0 } },
                    "models": { "diabetes_predictor": { "state": "ready", "version": "1.0.0", "algorithm": "random_forest" } }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health: HealthReport = client.get("health").await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.models["diabetes_predictor"].version.as_deref(), Some("1.0.0"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_sends_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict/diabetes")
            .match_body(mockito::Matcher::PartialJson(json!({ "age": 30, "heredity": 1 })))
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "prediction_type": "diabetes",
                    "risk_score": 42.5,
                    "risk_assessment": "Moderate Risk",
                    "risk_level": "medium",
                    "recommendation": "Monitor",
                    "confidence": 0.8,
                    "disclaimer": "d",
                    "model_version": "1.0.0",
                    "prediction_timestamp": "2026-01-01T00:00:00Z",
                    "input_data": {}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let request = DiabetesRequest {
            age: 30,
            pregnancy_no: 1,
            weight: 70.0,
            height: 165.0,
            bmi: 25.7,
            heredity: 1,
        };
        let result: PredictionResult = client.post("predict/diabetes", &request).await.unwrap();
        assert_eq!(result.risk_score, Some(42.5));
        assert_eq!(result.predicted_weight, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_uses_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict/baby-weight")
            .with_status(503)
            .with_body(r#"{"detail":"Baby weight model not loaded. Please train or load the model first."}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .post::<PredictionResult, _>("predict/baby-weight", &json!({}))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("Baby weight model not loaded"));
    }

    #[tokio::test]
    async fn test_error_falls_back_to_raw_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/data/summary")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.get::<DataSummary>("data/summary").await.unwrap_err();
        assert!(err.to_string().ends_with("boom"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
