//! Data ingestion pipeline
//!
//! Turns raw screening exports dropped into the upload directory into cleaned
//! CSV files under the processed directory:
//!
//! detect type → read → validate (quality score) → clean → write → archive original
//!
//! Per-file failures are reported as [`FileOutcome::Error`] records and never
//! abort a batch.

use crate::dataset::{iqr_bounds, ColumnType, Table};
use crate::error::{Error, Result};
use crate::observability::{ServiceMetrics, StructuredLogger};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BABY_WEIGHT_SIGNATURE: &[&str] = &["case", "bwt", "gestation", "parity", "age", "height", "weight", "smoke"];
const DIABETES_SIGNATURE: &[&str] = &[
    "age",
    "bmi",
    "glucose",
    "family_history",
    "previous_gd",
    "pregnancy_weeks",
    "diabetes_diagnosis",
];

const BABY_WEIGHT_CRITICAL: &[&str] = &["bwt", "gestation", "age", "height", "weight"];
const DIABETES_CRITICAL: &[&str] = &["age", "bmi", "glucose", "diabetes_diagnosis"];

const BABY_WEIGHT_DEFAULTS: &[(&str, f64)] = &[("parity", 0.0), ("smoke", 0.0)];
const DIABETES_DEFAULTS: &[(&str, f64)] = &[("family_history", 0.0), ("previous_gd", 0.0), ("pregnancy_weeks", 24.0)];

/// Weight of the missing-cell fraction in the quality score
const MISSING_WEIGHT: f64 = 0.7;
/// Weight of the outlier fraction in the quality score
const OUTLIER_WEIGHT: f64 = 0.3;

pub const NO_FILES_MESSAGE: &str = "No data files found in upload directory";

/// Dataset type inferred from a file's column signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    BabyWeight,
    Diabetes,
    Unknown,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::BabyWeight => "baby_weight",
            DatasetKind::Diabetes => "diabetes",
            DatasetKind::Unknown => "unknown",
        }
    }

    /// Match a header row against the known signatures; baby weight wins ties
    pub fn from_headers(headers: &[String]) -> Self {
        let has_all = |signature: &[&str]| signature.iter().all(|col| headers.iter().any(|h| h == col));
        if has_all(BABY_WEIGHT_SIGNATURE) {
            DatasetKind::BabyWeight
        } else if has_all(DIABETES_SIGNATURE) {
            DatasetKind::Diabetes
        } else {
            DatasetKind::Unknown
        }
    }

    fn critical_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::BabyWeight => BABY_WEIGHT_CRITICAL,
            DatasetKind::Diabetes => DIABETES_CRITICAL,
            DatasetKind::Unknown => &[],
        }
    }

    fn defaults(&self) -> &'static [(&'static str, f64)] {
        match self {
            DatasetKind::BabyWeight => BABY_WEIGHT_DEFAULTS,
            DatasetKind::Diabetes => DIABETES_DEFAULTS,
            DatasetKind::Unknown => &[],
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data quality report for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total_records: usize,
    pub missing_values: BTreeMap<String, usize>,
    pub data_types: BTreeMap<String, ColumnType>,
    /// IQR outlier counts, numeric columns only
    pub outliers: BTreeMap<String, usize>,
    pub quality_score: f64,
}

/// Result of processing one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Success {
        filename: String,
        data_type: DatasetKind,
        original_records: usize,
        processed_records: usize,
        quality_score: f64,
        processed_file: PathBuf,
        validation_results: ValidationReport,
    },
    Error {
        filename: String,
        message: String,
    },
}

impl FileOutcome {
    pub fn filename(&self) -> &str {
        match self {
            FileOutcome::Success { filename, .. } | FileOutcome::Error { filename, .. } => filename,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Success { .. })
    }
}

/// Result of an ingestion run over one or more files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub processed_files: Vec<FileOutcome>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.processed_files.iter().filter(|f| f.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.processed_files.len() - self.succeeded()
    }
}

/// Files currently in the upload and processed directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSummary {
    pub upload_directory: PathBuf,
    pub processed_directory: PathBuf,
    pub uploaded_files: Vec<String>,
    pub processed_files: Vec<String>,
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Sorted names of the CSV files directly inside `dir`; a missing directory is empty
fn list_csv(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && is_csv(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Rename, falling back to copy + remove across filesystems
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| Error::io(to, e))?;
    fs::remove_file(from).map_err(|e| Error::io(from, e))
}

pub struct DataIngestionPipeline {
    upload_dir: PathBuf,
    processed_dir: PathBuf,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl DataIngestionPipeline {
    /// Create the pipeline, creating both directories if needed
    pub fn new(upload_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Result<Self> {
        let upload_dir = upload_dir.into();
        let processed_dir = processed_dir.into();
        for dir in [&upload_dir, &processed_dir] {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        Ok(Self {
            upload_dir,
            processed_dir,
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::new("maternal-predictor"),
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Infer the dataset type from the header row; unreadable files are `Unknown`
    pub fn detect_type(&self, path: &Path) -> DatasetKind {
        match Table::read_headers(path) {
            Ok(headers) => DatasetKind::from_headers(&headers),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Could not read headers");
                DatasetKind::Unknown
            }
        }
    }

    /// Missing counts, column types, IQR outlier counts and the quality score
    pub fn validate(&self, table: &Table) -> ValidationReport {
        let rows = table.n_rows();
        let mut missing_values = BTreeMap::new();
        let mut data_types = BTreeMap::new();
        let mut outliers = BTreeMap::new();

        for (idx, name) in table.headers().iter().enumerate() {
            missing_values.insert(name.clone(), table.missing_count(idx));
            let column_type = table.column_type(idx);
            data_types.insert(name.clone(), column_type);
            if column_type == ColumnType::Numeric {
                let values = table.numeric_values(idx);
                let count = iqr_bounds(&values)
                    .map(|(lo, hi)| values.iter().filter(|&&v| v < lo || v > hi).count())
                    .unwrap_or(0);
                outliers.insert(name.clone(), count);
            }
        }

        let quality_score = if rows == 0 {
            0.0
        } else {
            let total_missing: usize = missing_values.values().sum();
            let total_outliers: usize = outliers.values().sum();
            let missing_fraction = total_missing as f64 / (rows * table.n_cols()).max(1) as f64;
            let outlier_fraction = if outliers.is_empty() {
                0.0
            } else {
                total_outliers as f64 / (rows * outliers.len()) as f64
            };
            (1.0 - (MISSING_WEIGHT * missing_fraction + OUTLIER_WEIGHT * outlier_fraction)).clamp(0.0, 1.0)
        };

        ValidationReport {
            total_records: rows,
            missing_values,
            data_types,
            outliers,
            quality_score,
        }
    }

    /// Deduplicate, drop rows missing critical columns, fill defaults, then
    /// apply the IQR filter column by column.
    pub fn clean(&self, table: &Table, kind: DatasetKind) -> Result<Table> {
        let mut cleaned = table.drop_duplicates()?;

        let critical = kind.critical_columns();
        cleaned.require_columns(critical)?;
        cleaned = cleaned.drop_missing_in(critical)?;
        for &(column, fill) in kind.defaults() {
            cleaned = cleaned.fill_missing(column, fill)?;
        }

        for idx in cleaned.numeric_columns() {
            // No present values leaves no bounds, which drops every row
            let bounds = iqr_bounds(&cleaned.numeric_values(idx));
            cleaned = cleaned.filter_rows(|row| match (bounds, row[idx].as_f64()) {
                (Some((lo, hi)), Some(v)) => v >= lo && v <= hi,
                _ => false,
            });
        }
        Ok(cleaned)
    }

    /// Process one file; every failure becomes an error record
    pub fn process_file(&self, path: &Path) -> FileOutcome {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let outcome = match self.try_process(path, &filename) {
            Ok(outcome) => outcome,
            Err(e) => FileOutcome::Error {
                filename,
                message: e.to_string(),
            },
        };

        match &outcome {
            FileOutcome::Success {
                filename,
                data_type,
                original_records,
                processed_records,
                quality_score,
                ..
            } => {
                self.metrics.record_ingestion("success", Some(*quality_score));
                self.logger.log_data_ingested(
                    filename,
                    data_type.as_str(),
                    *original_records,
                    *processed_records,
                    *quality_score,
                );
            }
            FileOutcome::Error { filename, message } => {
                self.metrics.record_ingestion("error", None);
                self.logger.log_ingestion_failed(filename, message);
            }
        }
        outcome
    }

    fn try_process(&self, path: &Path, filename: &str) -> Result<FileOutcome> {
        let kind = self.detect_type(path);
        if kind == DatasetKind::Unknown {
            return Ok(FileOutcome::Error {
                filename: filename.to_string(),
                message: "Unknown data format".to_string(),
            });
        }

        let table = Table::read_csv(path)?;
        let validation = self.validate(&table);
        let cleaned = self.clean(&table, kind)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let processed_file = self.processed_dir.join(format!("{kind}_{timestamp}_{filename}"));
        cleaned.write_csv(&processed_file)?;
        info!(path = %processed_file.display(), rows = cleaned.n_rows(), "Processed data saved");

        move_file(path, &self.processed_dir.join(format!("original_{filename}")))?;

        Ok(FileOutcome::Success {
            filename: filename.to_string(),
            data_type: kind,
            original_records: table.n_rows(),
            processed_records: cleaned.n_rows(),
            quality_score: validation.quality_score,
            processed_file,
            validation_results: validation,
        })
    }

    /// Process `path`, or every CSV file in the upload directory
    pub fn process_pending(&self, path: Option<&Path>) -> Result<BatchOutcome> {
        if let Some(path) = path {
            return Ok(BatchOutcome {
                message: None,
                processed_files: vec![self.process_file(path)],
            });
        }

        let files = list_csv(&self.upload_dir)?;
        if files.is_empty() {
            return Ok(BatchOutcome {
                message: Some(NO_FILES_MESSAGE.to_string()),
                processed_files: Vec::new(),
            });
        }

        let processed_files: Vec<FileOutcome> = files
            .iter()
            .map(|name| self.process_file(&self.upload_dir.join(name)))
            .collect();
        let batch = BatchOutcome {
            message: None,
            processed_files,
        };
        info!(succeeded = batch.succeeded(), failed = batch.failed(), "Ingestion batch complete");
        Ok(batch)
    }

    pub fn summary(&self) -> Result<DataSummary> {
        Ok(DataSummary {
            upload_directory: self.upload_dir.clone(),
            processed_directory: self.processed_dir.clone(),
            uploaded_files: list_csv(&self.upload_dir)?,
            processed_files: list_csv(&self.processed_dir)?,
        })
    }
}
