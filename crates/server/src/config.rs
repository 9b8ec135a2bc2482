//! Server configuration

use anyhow::Result;
use predictor_lib::RegistryConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Server configuration, read from `PREDICTOR_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding `<task>_model.json` and `<task>_model_scaler.json`
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    /// Comma-separated in the environment
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Trees per ensemble candidate
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models/saved")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

fn default_n_estimators() -> usize {
    predictor_lib::learners::DEFAULT_ESTIMATORS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model_dir: default_model_dir(),
            upload_dir: default_upload_dir(),
            processed_dir: default_processed_dir(),
            cors_origins: default_cors_origins(),
            n_estimators: default_n_estimators(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("PREDICTOR")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            model_dir: self.model_dir.clone(),
            upload_dir: self.upload_dir.clone(),
            processed_dir: self.processed_dir.clone(),
            n_estimators: self.n_estimators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.cors_origins.len(), 3);
        assert_eq!(config.registry_config().model_dir, PathBuf::from("models/saved"));
        assert_eq!(config.n_estimators, 100);
    }

    #[test]
    fn test_empty_source_uses_defaults() {
        let config: ServerConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.processed_dir, PathBuf::from("data/processed"));
    }
}
