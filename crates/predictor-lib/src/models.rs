//! Request and response models for the prediction API

use crate::error::{Error, Result};
use crate::predictor::FeatureVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Allowed BMI derived from height and weight on baby weight requests
pub const BMI_RANGE: (f64, f64) = (13.0, 55.0);

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(Error::Validation(format!(
            "{field} must be between {min} and {max} (got {value})"
        )));
    }
    Ok(())
}

/// Baby weight prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BabyWeightRequest {
    /// Gestational age in weeks
    pub gestational_age: f64,
    /// Maternal age in years
    pub maternal_age: u32,
    /// Maternal height in cm
    pub maternal_height: f64,
    /// Maternal weight in kg
    pub maternal_weight: f64,
    /// Number of previous pregnancies (parity)
    pub previous_pregnancies: u32,
    /// 0 = non-smoker, 1 = smoker
    #[serde(default)]
    pub smoking_status: u32,
}

impl BabyWeightRequest {
    pub fn bmi(&self) -> f64 {
        let height_m = self.maternal_height / 100.0;
        self.maternal_weight / (height_m * height_m)
    }

    pub fn validate(&self) -> Result<()> {
        check_range("gestational_age", self.gestational_age, 20.0, 45.0)?;
        check_range("maternal_age", self.maternal_age as f64, 13.0, 60.0)?;
        check_range("maternal_height", self.maternal_height, 120.0, 220.0)?;
        check_range("maternal_weight", self.maternal_weight, 30.0, 200.0)?;
        check_range("previous_pregnancies", self.previous_pregnancies as f64, 0.0, 10.0)?;
        check_range("smoking_status", self.smoking_status as f64, 0.0, 1.0)?;

        let bmi = self.bmi();
        if bmi < BMI_RANGE.0 || bmi > BMI_RANGE.1 {
            return Err(Error::Validation(format!(
                "Weight seems unreasonable for the given height (BMI: {bmi:.1}). BMI should be between 13-55."
            )));
        }
        Ok(())
    }
}

/// Gestational diabetes risk request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiabetesRequest {
    pub age: u32,
    pub pregnancy_no: u32,
    /// kg
    pub weight: f64,
    /// cm
    pub height: f64,
    pub bmi: f64,
    /// Family history of diabetes, 0 or 1
    pub heredity: u32,
}

impl DiabetesRequest {
    pub fn validate(&self) -> Result<()> {
        check_range("age", self.age as f64, 13.0, 60.0)?;
        check_range("pregnancy_no", self.pregnancy_no as f64, 1.0, 10.0)?;
        check_range("weight", self.weight, 30.0, 200.0)?;
        check_range("height", self.height, 120.0, 220.0)?;
        check_range("bmi", self.bmi, 15.0, 60.0)?;
        check_range("heredity", self.heredity as f64, 0.0, 1.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Normal,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Normal => "normal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightCategory {
    #[serde(rename = "Low Birth Weight")]
    Low,
    #[serde(rename = "Normal Birth Weight")]
    Normal,
    #[serde(rename = "High Birth Weight")]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskAssessment {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    High,
}

/// Task-specific part of a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "prediction_type", rename_all = "snake_case")]
pub enum PredictionOutcome {
    BabyWeight {
        /// Grams
        predicted_weight: f64,
        weight_category: WeightCategory,
        risk_level: RiskLevel,
    },
    Diabetes {
        /// 0-100
        risk_score: f64,
        risk_assessment: RiskAssessment,
        risk_level: RiskLevel,
    },
}

impl PredictionOutcome {
    pub fn risk_level(&self) -> RiskLevel {
        match self {
            PredictionOutcome::BabyWeight { risk_level, .. }
            | PredictionOutcome::Diabetes { risk_level, .. } => *risk_level,
        }
    }

    /// The headline number: grams or risk score
    pub fn value(&self) -> f64 {
        match self {
            PredictionOutcome::BabyWeight { predicted_weight, .. } => *predicted_weight,
            PredictionOutcome::Diabetes { risk_score, .. } => *risk_score,
        }
    }
}

/// Prediction result returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: PredictionOutcome,
    pub recommendation: String,
    pub confidence: f64,
    pub disclaimer: String,
    pub model_version: String,
    pub prediction_timestamp: DateTime<Utc>,
    /// Model inputs, in feature order
    pub input_data: FeatureVector,
}

/// Body of a retrain request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainRequest {
    #[serde(default)]
    pub data_file_path: Option<String>,
}

/// Body of an evaluation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub data_file_path: String,
}

/// Body of an ingestion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub file_path: Option<String>,
}
