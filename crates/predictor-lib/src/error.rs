//! Error taxonomy for the prediction library

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by datasets, learners, predictors and the ingestion pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Required columns are absent from a table
    #[error("Missing required columns: {missing:?}")]
    Schema { missing: Vec<String> },

    /// A scaler was used before `fit` (or before a persisted fit was loaded)
    #[error("Feature scaler is not fitted")]
    NotFitted,

    /// A predictor was asked for inference before a model was loaded or trained
    #[error("{0} model not loaded. Please train or load the model first.")]
    NotLoaded(String),

    /// A feature row does not have the width the scaler or model was fitted on
    #[error("Feature vector has {got} values, expected {expected}")]
    FeatureMismatch { expected: usize, got: usize },

    /// Model training failed; candidate failures are fatal
    #[error("Training failed: {0}")]
    Training(String),

    /// A request field is out of its allowed range
    #[error("{0}")]
    Validation(String),

    /// File read/write/move failure
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV input or output
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A data frame operation rejected the table
    #[error("Data frame error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    /// A persisted model or scaler artifact could not be used
    #[error("Invalid artifact: {0}")]
    Artifact(String),
}

impl Error {
    /// Attach a path to an `std::io::Error`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Artifact(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_columns() {
        let err = Error::Schema {
            missing: vec!["bwt".to_string(), "smoke".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("bwt"));
        assert!(msg.contains("smoke"));
    }

    #[test]
    fn test_not_loaded_message() {
        let err = Error::NotLoaded("Diabetes".to_string());
        assert!(err.to_string().starts_with("Diabetes model not loaded"));
    }
}
