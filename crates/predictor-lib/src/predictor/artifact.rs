//! Model and scaler persistence
//!
//! Each task owns two files under the model directory:
//!
//! - `<task>_model.json`: metadata, SHA-256 checksum and the fitted model
//! - `<task>_model_scaler.json`: the fitted scaler and the revision it pairs with
//!
//! Files are written to a temp path, synced and renamed into place. A load
//! only succeeds when both files parse, the checksum matches, the revisions
//! agree and the recorded feature order equals the expected one.

use super::features::FeatureScaler;
use super::selector::{CandidateScore, SelectionMetric};
use crate::error::{Error, Result};
use crate::learners::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Describes a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub task: String,
    pub version: String,
    pub revision: u64,
    pub algorithm: String,
    pub metric: SelectionMetric,
    pub score: f64,
    pub trained_at: DateTime<Utc>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_names: Vec<String>,
    pub leaderboard: Vec<CandidateScore>,
}

/// Version string for a training revision
pub fn version_for(revision: u64) -> String {
    format!("1.0.{revision}")
}

/// Immutable (model, scaler, metadata) triple swapped in as a unit
#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    pub model: Model,
    pub scaler: FeatureScaler,
    pub metadata: ModelMetadata,
}

#[derive(Serialize, Deserialize)]
struct ModelFile {
    metadata: ModelMetadata,
    checksum: String,
    model: Model,
}

#[derive(Serialize, Deserialize)]
struct ScalerFile {
    task: String,
    revision: u64,
    feature_names: Vec<String>,
    scaler: FeatureScaler,
}

/// Fixed artifact locations for one task
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    model_path: PathBuf,
    scaler_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(model_dir: impl Into<PathBuf>, task: &str) -> Self {
        let dir = model_dir.into();
        Self {
            model_path: dir.join(format!("{task}_model.json")),
            scaler_path: dir.join(format!("{task}_model_scaler.json")),
            dir,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn scaler_path(&self) -> &Path {
        &self.scaler_path
    }

    /// Persist both artifacts; the scaler is written first
    pub fn save(&self, snapshot: &ModelSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        let scaler = ScalerFile {
            task: snapshot.metadata.task.clone(),
            revision: snapshot.metadata.revision,
            feature_names: snapshot.metadata.feature_names.clone(),
            scaler: snapshot.scaler.clone(),
        };
        write_atomic(&self.scaler_path, &serde_json::to_vec_pretty(&scaler)?)?;

        let model = ModelFile {
            metadata: snapshot.metadata.clone(),
            checksum: compute_checksum(&serde_json::to_vec(&snapshot.model)?),
            model: snapshot.model.clone(),
        };
        write_atomic(&self.model_path, &serde_json::to_vec_pretty(&model)?)?;

        debug!(
            model = %self.model_path.display(),
            scaler = %self.scaler_path.display(),
            version = %snapshot.metadata.version,
            "Artifacts saved"
        );
        Ok(())
    }

    pub fn load(&self, expected_features: &[&str]) -> Result<ModelSnapshot> {
        let model_file: ModelFile = read_json(&self.model_path)?;
        let scaler_file: ScalerFile = read_json(&self.scaler_path)?;

        let checksum = compute_checksum(&serde_json::to_vec(&model_file.model)?);
        if checksum != model_file.checksum {
            return Err(Error::Artifact(format!(
                "Checksum mismatch: expected {}, got {}",
                model_file.checksum, checksum
            )));
        }

        if scaler_file.revision != model_file.metadata.revision {
            return Err(Error::Artifact(format!(
                "Scaler revision {} does not match model revision {}",
                scaler_file.revision, model_file.metadata.revision
            )));
        }

        for names in [&model_file.metadata.feature_names, &scaler_file.feature_names] {
            if names.iter().map(String::as_str).ne(expected_features.iter().copied()) {
                return Err(Error::Artifact(format!(
                    "Feature order {names:?} does not match expected {expected_features:?}"
                )));
            }
        }

        let width = expected_features.len();
        if !scaler_file.scaler.is_fitted() {
            return Err(Error::NotFitted);
        }
        if scaler_file.scaler.n_features() != width || model_file.model.n_features() != width {
            return Err(Error::FeatureMismatch {
                expected: width,
                got: scaler_file.scaler.n_features(),
            });
        }

        Ok(ModelSnapshot {
            model: model_file.model,
            scaler: scaler_file.scaler,
            metadata: model_file.metadata,
        })
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write via a temp file and rename
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
    file.write_all(bytes).map_err(|e| Error::io(&temp_path, e))?;
    file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// SHA-256 of the serialized model, hex encoded
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learners::{EnsembleParams, Objective};
    use ndarray::{Array1, Array2};
    use tempfile::TempDir;

    const FEATURES: &[&str] = &["x0", "x1"];

    fn snapshot(revision: u64) -> ModelSnapshot {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i + j) % 7) as f64);
        let y: Array1<f64> = x.rows().into_iter().map(|r| r[0] * 2.0 + r[1]).collect();
        let mut model = Model::candidates(
            Objective::Regression,
            EnsembleParams {
                n_estimators: 3,
                seed: 42,
            },
        )
        .remove(1);
        model.fit(x.view(), y.view()).unwrap();

        ModelSnapshot {
            model,
            scaler: FeatureScaler::fitted(x.view()).unwrap(),
            metadata: ModelMetadata {
                task: "test".to_string(),
                version: version_for(revision),
                revision,
                algorithm: "gradient_boosting".to_string(),
                metric: SelectionMetric::R2,
                score: 0.9,
                trained_at: Utc::now(),
                train_rows: 24,
                test_rows: 6,
                feature_names: FEATURES.iter().map(|s| s.to_string()).collect(),
                leaderboard: Vec::new(),
            },
        }
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"model bytes");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, compute_checksum(b"model bytes"));
        assert_ne!(checksum, compute_checksum(b"other bytes"));
    }

    #[test]
    fn test_paths() {
        let store = ArtifactStore::new("/models", "baby_weight");
        assert_eq!(store.model_path(), Path::new("/models/baby_weight_model.json"));
        assert_eq!(store.scaler_path(), Path::new("/models/baby_weight_model_scaler.json"));
        assert_eq!(version_for(0), "1.0.0");
        assert_eq!(version_for(3), "1.0.3");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested"), "test");
        let original = snapshot(2);
        store.save(&original).unwrap();

        let loaded = store.load(FEATURES).unwrap();
        assert_eq!(loaded.metadata, original.metadata);
        assert_eq!(loaded.scaler, original.scaler);
        assert_eq!(loaded.model, original.model);
        assert!(!store.model_path().with_extension("tmp").exists());
    }

    #[test]
    fn test_missing_scaler_fails() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), "test");
        store.save(&snapshot(0)).unwrap();
        fs::remove_file(store.scaler_path()).unwrap();
        assert!(matches!(store.load(FEATURES), Err(Error::Io { .. })));
    }

    #[test]
    fn test_corrupt_model_fails() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), "test");
        store.save(&snapshot(0)).unwrap();
        fs::write(store.model_path(), b"{ not json").unwrap();
        assert!(matches!(store.load(FEATURES), Err(Error::Artifact(_))));
    }

    #[test]
    fn test_tampered_checksum_fails() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), "test");
        store.save(&snapshot(0)).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(store.model_path()).unwrap()).unwrap();
        value["checksum"] = serde_json::Value::String("0".repeat(64));
        fs::write(store.model_path(), serde_json::to_vec(&value).unwrap()).unwrap();

        let err = store.load(FEATURES).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn test_revision_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), "test");
        store.save(&snapshot(1)).unwrap();
        let scaler_only = fs::read(store.scaler_path()).unwrap();
        store.save(&snapshot(2)).unwrap();
        fs::write(store.scaler_path(), scaler_only).unwrap();

        let err = store.load(FEATURES).unwrap_err();
        assert!(err.to_string().contains("revision"));
    }

    #[test]
    fn test_feature_order_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), "test");
        store.save(&snapshot(0)).unwrap();
        let err = store.load(&["x1", "x0"]).unwrap_err();
        assert!(err.to_string().contains("Feature order"));
    }
}
