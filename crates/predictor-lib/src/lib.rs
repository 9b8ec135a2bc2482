//! Prediction library for the maternal health service
//!
//! This crate provides the core functionality for:
//! - Tabular data loading and cleaning
//! - Native tree ensembles and logistic regression
//! - Per-task model lifecycle: preparation, selection, persistence, inference
//! - Data ingestion with quality scoring
//! - Health checks and observability

pub mod dataset;
pub mod error;
pub mod health;
pub mod ingestion;
pub mod learners;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod registry;

pub use error::{Error, Result};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use registry::{RegistryConfig, ServiceRegistry, StartupReport};
