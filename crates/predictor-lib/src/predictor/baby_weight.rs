//! Birth weight regression task

use super::output::{Interpretation, OutputFormatter};
use super::{clean_required, FeatureVector, PredictionTask};
use crate::dataset::synthetic::{baby_weight_samples, BABY_WEIGHT_SAMPLES};
use crate::dataset::Table;
use crate::error::Result;
use crate::learners::Objective;
use crate::models::BabyWeightRequest;

pub struct BabyWeightTask;

impl PredictionTask for BabyWeightTask {
    type Request = BabyWeightRequest;

    const NAME: &'static str = "baby_weight";
    const LABEL: &'static str = "Baby weight";
    const OBJECTIVE: Objective = Objective::Regression;
    const FEATURE_NAMES: &'static [&'static str] =
        &["gestation_weeks", "age", "height", "weight", "parity", "smoke", "bmi"];
    const TARGET: &'static str = "bwt";
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["case", "bwt", "gestation", "parity", "age", "height", "weight", "smoke"];
    const UPLOAD_FILE: &'static str = "babies.csv";
    const CONFIDENCE: f64 = 0.85;
    const DISCLAIMER: &'static str = "This prediction is based on statistical models and should not replace professional medical advice. Actual birth weight can vary significantly.";

    fn synthetic(seed: u64) -> Result<Table> {
        baby_weight_samples(BABY_WEIGHT_SAMPLES, seed)
    }

    /// Derives `gestation_weeks = gestation / 7` and `bmi = weight / (height/100)²`;
    /// rows whose derived values are not finite are dropped.
    fn prepare(table: &Table) -> Result<Table> {
        let table = clean_required(table, Self::REQUIRED_COLUMNS)?;

        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(table.n_rows()); Self::FEATURE_NAMES.len() + 1];
        for row in table.rows() {
            let field = |name: &str| table.number(row, name).unwrap_or(f64::NAN);
            let height = field("height");
            let weight = field("weight");
            let height_m = height / 100.0;
            let values = [
                field("gestation") / 7.0,
                field("age"),
                height,
                weight,
                field("parity"),
                field("smoke"),
                weight / (height_m * height_m),
                field("bwt"),
            ];
            if values.iter().all(|v| v.is_finite()) {
                for (column, value) in columns.iter_mut().zip(values) {
                    column.push(value);
                }
            }
        }

        let names = Self::FEATURE_NAMES.iter().copied().chain(std::iter::once(Self::TARGET));
        Ok(Table::from_columns(names.zip(columns).collect()))
    }

    fn features(request: &BabyWeightRequest) -> Result<FeatureVector> {
        request.validate()?;
        FeatureVector::new(
            Self::FEATURE_NAMES,
            vec![
                request.gestational_age,
                request.maternal_age as f64,
                request.maternal_height,
                request.maternal_weight,
                request.previous_pregnancies as f64,
                request.smoking_status as f64,
                request.bmi(),
            ],
        )
    }

    fn interpret(formatter: &OutputFormatter, raw: f64, request: &BabyWeightRequest) -> Result<Interpretation> {
        Ok(formatter.format_weight(raw, request))
    }
}
