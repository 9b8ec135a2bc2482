//! Gestational diabetes risk classification task

use super::output::{Interpretation, OutputFormatter};
use super::{clean_required, FeatureVector, PredictionTask};
use crate::dataset::synthetic::{diabetes_samples, DIABETES_SAMPLES};
use crate::dataset::{Table, Value};
use crate::error::Result;
use crate::learners::Objective;
use crate::models::DiabetesRequest;

pub struct DiabetesTask;

impl PredictionTask for DiabetesTask {
    type Request = DiabetesRequest;

    const NAME: &'static str = "diabetes";
    const LABEL: &'static str = "Diabetes";
    const OBJECTIVE: Objective = Objective::Classification;
    const FEATURE_NAMES: &'static [&'static str] =
        &["Age", "Pregnancy No", "Weight", "Height", "BMI", "Heredity"];
    const TARGET: &'static str = "Prediction";
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["Age", "Pregnancy No", "Weight", "Height", "BMI", "Heredity", "Prediction"];
    const UPLOAD_FILE: &'static str = "GestationalDiabetes.csv";
    const CONFIDENCE: f64 = 0.80;
    const DISCLAIMER: &'static str = "This is a preliminary risk assessment tool. Only proper medical testing can definitively diagnose gestational diabetes. Please consult your healthcare provider.";

    fn synthetic(seed: u64) -> Result<Table> {
        diabetes_samples(DIABETES_SAMPLES, seed)
    }

    /// Keeps the feature columns and binarizes the label (`> 0` → 1)
    fn prepare(table: &Table) -> Result<Table> {
        let table = clean_required(table, Self::REQUIRED_COLUMNS)?;

        let headers: Vec<String> = Self::REQUIRED_COLUMNS.iter().map(|s| s.to_string()).collect();
        let rows: Vec<Vec<Value>> = table
            .rows()
            .iter()
            .map(|row| {
                Self::REQUIRED_COLUMNS
                    .iter()
                    .map(|&name| {
                        let value = table.number(row, name).unwrap_or(f64::NAN);
                        if name == Self::TARGET {
                            Value::Number(if value > 0.0 { 1.0 } else { 0.0 })
                        } else {
                            Value::from(value)
                        }
                    })
                    .collect()
            })
            .collect();
        Ok(Table::new(headers, rows))
    }

    fn features(request: &DiabetesRequest) -> Result<FeatureVector> {
        request.validate()?;
        FeatureVector::new(
            Self::FEATURE_NAMES,
            vec![
                request.age as f64,
                request.pregnancy_no as f64,
                request.weight,
                request.height,
                request.bmi,
                request.heredity as f64,
            ],
        )
    }

    fn interpret(formatter: &OutputFormatter, raw: f64, _request: &DiabetesRequest) -> Result<Interpretation> {
        formatter.format_diabetes(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_binarizes_label() {
        let table = Table::from_columns(vec![
            ("Age", vec![30.0, 35.0, 28.0]),
            ("Pregnancy No", vec![1.0, 3.0, 2.0]),
            ("Weight", vec![60.0, 85.0, 70.0]),
            ("Height", vec![160.0, 158.0, 165.0]),
            ("BMI", vec![23.4, 34.0, 25.7]),
            ("Heredity", vec![0.0, 1.0, 0.0]),
            ("Prediction", vec![0.0, 2.0, 1.0]),
            ("Extra", vec![9.0, 9.0, 9.0]),
        ]);
        let prepared = DiabetesTask::prepare(&table).unwrap();
        assert_eq!(prepared.n_cols(), 7);
        let labels = prepared.numeric_values(prepared.column_index("Prediction").unwrap());
        assert_eq!(labels, vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_synthetic_has_training_schema() {
        let table = DiabetesTask::synthetic(42).unwrap();
        assert!(table.has_columns(DiabetesTask::REQUIRED_COLUMNS));
        let prepared = DiabetesTask::prepare(&table).unwrap();
        assert_eq!(prepared.n_rows(), 1000);
    }

    #[test]
    fn test_features_follow_order() {
        let request = DiabetesRequest {
            age: 38,
            pregnancy_no: 2,
            weight: 95.0,
            height: 155.0,
            bmi: 39.5,
            heredity: 1,
        };
        let features = DiabetesTask::features(&request).unwrap();
        assert_eq!(features.values(), &[38.0, 2.0, 95.0, 155.0, 39.5, 1.0]);
        assert_eq!(
            serde_json::to_string(&features).unwrap(),
            r#"{"Age":38.0,"Pregnancy No":2.0,"Weight":95.0,"Height":155.0,"BMI":39.5,"Heredity":1.0}"#
        );
    }
}
