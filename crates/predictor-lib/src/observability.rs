//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction latency and counts, fallbacks, training
//!   duration, selected-model score, ingestion outcomes)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_gauge_vec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec, Gauge, GaugeVec, HistogramVec, IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Histogram buckets for training duration (in seconds)
const TRAINING_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    fallback_predictions_total: IntCounterVec,
    training_duration_seconds: HistogramVec,
    trainings_total: IntCounterVec,
    model_score: GaugeVec,
    model_revision: IntGaugeVec,
    ingested_files_total: IntCounterVec,
    data_quality_score: Gauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "maternal_predictor_prediction_latency_seconds",
                "Time spent validating, scaling and running inference",
                &["task"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "maternal_predictor_predictions_total",
                "Total number of predictions served",
                &["task"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "maternal_predictor_prediction_errors_total",
                "Total number of failed prediction requests",
                &["task"]
            )
            .expect("Failed to register prediction_errors_total"),

            fallback_predictions_total: register_int_counter_vec!(
                "maternal_predictor_fallback_predictions_total",
                "Predictions replaced by the fallback formula",
                &["task"]
            )
            .expect("Failed to register fallback_predictions_total"),

            training_duration_seconds: register_histogram_vec!(
                "maternal_predictor_training_duration_seconds",
                "Wall time of a full training run including model selection",
                &["task"],
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            trainings_total: register_int_counter_vec!(
                "maternal_predictor_trainings_total",
                "Training runs by outcome",
                &["task", "outcome"]
            )
            .expect("Failed to register trainings_total"),

            model_score: register_gauge_vec!(
                "maternal_predictor_model_score",
                "Held-out score of the selected model (R2 or ROC-AUC)",
                &["task"]
            )
            .expect("Failed to register model_score"),

            model_revision: register_int_gauge_vec!(
                "maternal_predictor_model_revision",
                "Revision of the model currently serving",
                &["task"]
            )
            .expect("Failed to register model_revision"),

            ingested_files_total: register_int_counter_vec!(
                "maternal_predictor_ingested_files_total",
                "Files processed by the ingestion pipeline by status",
                &["status"]
            )
            .expect("Failed to register ingested_files_total"),

            data_quality_score: register_gauge!(
                "maternal_predictor_data_quality_score",
                "Quality score of the most recently ingested file"
            )
            .expect("Failed to register data_quality_score"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction(&self, task: &str, duration_secs: f64, used_fallback: bool) {
        let inner = self.inner();
        inner
            .prediction_latency_seconds
            .with_label_values(&[task])
            .observe(duration_secs);
        inner.predictions_total.with_label_values(&[task]).inc();
        if used_fallback {
            inner.fallback_predictions_total.with_label_values(&[task]).inc();
        }
    }

    pub fn inc_prediction_errors(&self, task: &str) {
        self.inner().prediction_errors_total.with_label_values(&[task]).inc();
    }

    pub fn observe_training(&self, task: &str, duration_secs: f64, success: bool) {
        let inner = self.inner();
        inner
            .training_duration_seconds
            .with_label_values(&[task])
            .observe(duration_secs);
        let outcome = if success { "success" } else { "failure" };
        inner.trainings_total.with_label_values(&[task, outcome]).inc();
    }

    /// Record the model now serving a task
    pub fn set_model(&self, task: &str, revision: u64, score: f64) {
        let inner = self.inner();
        inner
            .model_revision
            .with_label_values(&[task])
            .set(revision as i64);
        inner.model_score.with_label_values(&[task]).set(score);
    }

    pub fn record_ingestion(&self, status: &str, quality_score: Option<f64>) {
        let inner = self.inner();
        inner.ingested_files_total.with_label_values(&[status]).inc();
        if let Some(score) = quality_score {
            inner.data_quality_score.set(score);
        }
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for predictions,
/// training runs and ingestion.
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn log_prediction(&self, task: &str, value: f64, risk_level: &str, used_fallback: bool, model_version: &str) {
        info!(
            event = "prediction_generated",
            service = %self.service_name,
            task = %task,
            value = value,
            risk_level = %risk_level,
            used_fallback = used_fallback,
            model_version = %model_version,
            "Generated prediction"
        );
    }

    pub fn log_model_trained(
        &self,
        task: &str,
        version: &str,
        algorithm: &str,
        metric: &str,
        score: f64,
        data_source: &str,
        duration_secs: f64,
    ) {
        info!(
            event = "model_trained",
            service = %self.service_name,
            task = %task,
            version = %version,
            algorithm = %algorithm,
            metric = %metric,
            score = score,
            data_source = %data_source,
            duration_secs = duration_secs,
            "Model trained"
        );
    }

    pub fn log_training_failed(&self, task: &str, error: &str) {
        warn!(
            event = "model_training_failed",
            service = %self.service_name,
            task = %task,
            error = %error,
            "Model training failed, keeping previous model"
        );
    }

    pub fn log_model_loaded(&self, task: &str, version: &str, algorithm: &str) {
        info!(
            event = "model_loaded",
            service = %self.service_name,
            task = %task,
            version = %version,
            algorithm = %algorithm,
            "Loaded persisted model"
        );
    }

    /// Log a file processed by the ingestion pipeline
    pub fn log_data_ingested(&self, filename: &str, kind: &str, rows_in: usize, rows_out: usize, quality_score: f64) {
        info!(
            event = "data_ingested",
            service = %self.service_name,
            filename = %filename,
            kind = %kind,
            rows_in = rows_in,
            rows_out = rows_out,
            quality_score = quality_score,
            "Processed data file"
        );
    }

    pub fn log_ingestion_failed(&self, filename: &str, error: &str) {
        warn!(
            event = "data_ingestion_failed",
            service = %self.service_name,
            filename = %filename,
            error = %error,
            "Failed to process data file"
        );
    }

    pub fn log_startup(&self, version: &str, baby_weight_model: &str, diabetes_model: &str) {
        info!(
            event = "service_started",
            service = %self.service_name,
            service_version = %version,
            baby_weight_model = %baby_weight_model,
            diabetes_model = %diabetes_model,
            "Prediction service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Prediction service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_service_metrics_record() {
        let metrics = ServiceMetrics::new();
        metrics.observe_prediction("baby_weight", 0.002, true);
        metrics.inc_prediction_errors("diabetes");
        metrics.observe_training("diabetes", 1.5, true);
        metrics.set_model("diabetes", 3, 0.91);
        metrics.record_ingestion("success", Some(0.95));

        let families = prometheus::gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"maternal_predictor_predictions_total"));
        assert!(names.contains(&"maternal_predictor_model_score"));
    }

    #[test]
    fn test_metrics_handles_share_registry() {
        let a = ServiceMetrics::new();
        let b = a.clone();
        a.observe_prediction("shared_task", 0.001, false);
        b.observe_prediction("shared_task", 0.001, false);
        let count = a.inner().predictions_total.with_label_values(&["shared_task"]).get();
        assert_eq!(count, 2);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Run `f` under a JSON subscriber and return one value per emitted event
    fn capture_events(f: impl FnOnce()) -> Vec<serde_json::Value> {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(logs.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_structured_logger_emits_named_events() {
        let logger = StructuredLogger::new("test-service");
        let events = capture_events(|| {
            logger.log_prediction("diabetes", 42.5, "medium", false, "1.0.3");
            logger.log_training_failed("baby_weight", "Missing required columns");
            logger.log_shutdown("signal");
        });
        assert_eq!(events.len(), 3);

        let prediction = &events[0]["fields"];
        assert_eq!(prediction["event"], "prediction_generated");
        assert_eq!(prediction["service"], "test-service");
        assert_eq!(prediction["task"], "diabetes");
        assert_eq!(prediction["value"], 42.5);
        assert_eq!(prediction["risk_level"], "medium");
        assert_eq!(prediction["used_fallback"], false);
        assert_eq!(prediction["model_version"], "1.0.3");

        assert_eq!(events[1]["level"], "WARN");
        assert_eq!(events[1]["fields"]["event"], "model_training_failed");
        assert_eq!(events[1]["fields"]["error"], "Missing required columns");

        assert_eq!(events[2]["fields"]["event"], "service_shutdown");
        assert_eq!(events[2]["fields"]["reason"], "signal");
        assert_eq!(events[2]["fields"]["message"], "Prediction service shutting down");
    }

    #[test]
    fn test_startup_event_names_both_models() {
        let logger = StructuredLogger::new("maternal-predictor");
        let events = capture_events(|| logger.log_startup("0.1.0", "loaded 1.0.2", "trained 1.0.0"));
        let fields = &events[0]["fields"];
        assert_eq!(fields["event"], "service_started");
        assert_eq!(fields["baby_weight_model"], "loaded 1.0.2");
        assert_eq!(fields["diabetes_model"], "trained 1.0.0");
    }
}
