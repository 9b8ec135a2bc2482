//! Prediction post-processing
//!
//! Turns raw model outputs into bounded, bucketed outcomes. Baby weight
//! predictions outside the plausible range are recomputed with a linear
//! fallback formula; every weight is clamped and rounded to whole grams.
//! Diabetes probabilities become a 0-100 risk score with one decimal.
//! Categories and buckets are chosen before rounding.

use crate::error::{Error, Result};
use crate::models::{BabyWeightRequest, PredictionOutcome, RiskAssessment, RiskLevel, WeightCategory};

/// Raw weights outside this range trigger the fallback formula
pub const PLAUSIBLE_WEIGHT_GRAMS: (f64, f64) = (1000.0, 6000.0);

/// Every reported weight lies in this range
pub const REPORTED_WEIGHT_GRAMS: (f64, f64) = (2000.0, 5000.0);

pub const LOW_BIRTH_WEIGHT_GRAMS: f64 = 2500.0;
pub const HIGH_BIRTH_WEIGHT_GRAMS: f64 = 4000.0;

pub const LOW_RISK_MAX_SCORE: f64 = 30.0;
pub const MODERATE_RISK_MAX_SCORE: f64 = 60.0;

/// Formatting thresholds
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub plausible_weight: (f64, f64),
    pub reported_weight: (f64, f64),
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plausible_weight: PLAUSIBLE_WEIGHT_GRAMS,
            reported_weight: REPORTED_WEIGHT_GRAMS,
        }
    }
}

/// A sanitized outcome plus its recommendation text
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub outcome: PredictionOutcome,
    pub recommendation: &'static str,
    pub used_fallback: bool,
}

impl WeightCategory {
    pub fn from_grams(grams: f64) -> Self {
        if grams < LOW_BIRTH_WEIGHT_GRAMS {
            WeightCategory::Low
        } else if grams > HIGH_BIRTH_WEIGHT_GRAMS {
            WeightCategory::High
        } else {
            WeightCategory::Normal
        }
    }

    pub fn risk_level(&self) -> RiskLevel {
        match self {
            WeightCategory::Low => RiskLevel::Low,
            WeightCategory::High => RiskLevel::Medium,
            WeightCategory::Normal => RiskLevel::Normal,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            WeightCategory::Low => "Consider discussing nutrition and monitoring with your doctor.",
            WeightCategory::High => {
                "Monitor glucose levels and discuss delivery plans with your healthcare provider."
            }
            WeightCategory::Normal => {
                "Predicted weight is within normal range. Continue regular check-ups."
            }
        }
    }
}

impl RiskAssessment {
    pub fn from_score(score: f64) -> Self {
        if score <= LOW_RISK_MAX_SCORE {
            RiskAssessment::Low
        } else if score <= MODERATE_RISK_MAX_SCORE {
            RiskAssessment::Moderate
        } else {
            RiskAssessment::High
        }
    }

    pub fn risk_level(&self) -> RiskLevel {
        match self {
            RiskAssessment::Low => RiskLevel::Low,
            RiskAssessment::Moderate => RiskLevel::Medium,
            RiskAssessment::High => RiskLevel::High,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskAssessment::Low => {
                "Your risk appears low. Continue healthy eating and regular exercise. Monitor with routine check-ups."
            }
            RiskAssessment::Moderate => {
                "You may have moderate risk. Consider more frequent glucose monitoring and dietary consultation."
            }
            RiskAssessment::High => {
                "You may be at higher risk. Please consult your healthcare provider immediately for proper testing and monitoring."
            }
        }
    }
}

/// Linear birth weight estimate used when the model output is implausible
pub fn fallback_weight(request: &BabyWeightRequest) -> f64 {
    let age = request.maternal_age as f64;
    let base = 2500.0 + (request.gestational_age - 24.0) * 100.0;
    let age_factor = if (25.0..=35.0).contains(&age) {
        0.0
    } else if age > 35.0 {
        50.0
    } else {
        -50.0
    };
    let height_factor = (request.maternal_height - 165.0) * 5.0;
    let weight_factor = (request.maternal_weight - 65.0) * 3.0;
    let parity_factor = request.previous_pregnancies as f64 * 50.0;
    let smoke_factor = request.smoking_status as f64 * -100.0;
    base + age_factor + height_factor + weight_factor + parity_factor + smoke_factor
}

/// Formats raw model outputs into response outcomes
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn format_weight(&self, raw: f64, request: &BabyWeightRequest) -> Interpretation {
        let (lo, hi) = self.config.plausible_weight;
        let used_fallback = !raw.is_finite() || raw < lo || raw > hi;
        let estimate = if used_fallback { fallback_weight(request) } else { raw };

        let (min, max) = self.config.reported_weight;
        let clamped = estimate.clamp(min, max);
        let category = WeightCategory::from_grams(clamped);
        let grams = clamped.round();

        Interpretation {
            outcome: PredictionOutcome::BabyWeight {
                predicted_weight: grams,
                weight_category: category,
                risk_level: category.risk_level(),
            },
            recommendation: category.recommendation(),
            used_fallback,
        }
    }

    pub fn format_diabetes(&self, probability: f64) -> Result<Interpretation> {
        if !probability.is_finite() {
            return Err(Error::Artifact(format!(
                "Model produced a non-finite probability: {probability}"
            )));
        }
        let raw_score = (probability * 100.0).clamp(0.0, 100.0);
        let assessment = RiskAssessment::from_score(raw_score);
        let score = (raw_score * 10.0).round() / 10.0;

        Ok(Interpretation {
            outcome: PredictionOutcome::Diabetes {
                risk_score: score,
                risk_assessment: assessment,
                risk_level: assessment.risk_level(),
            },
            recommendation: assessment.recommendation(),
            used_fallback: false,
        })
    }
}
