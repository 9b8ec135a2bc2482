//! Prediction commands

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, BabyWeightRequest, DiabetesRequest, PredictionResult};
use crate::output::{color_risk, format_confidence, format_grams, print_json, OutputFormat};

pub async fn predict_weight(client: &ApiClient, request: BabyWeightRequest, format: OutputFormat) -> Result<()> {
    let result: PredictionResult = client.post("predict/baby-weight", &request).await?;
    render(&result, format)
}

pub async fn predict_diabetes(client: &ApiClient, request: DiabetesRequest, format: OutputFormat) -> Result<()> {
    let result: PredictionResult = client.post("predict/diabetes", &request).await?;
    render(&result, format)
}

/// kg / m², rounded to one decimal
pub fn derive_bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    (weight_kg / (height_m * height_m) * 10.0).round() / 10.0
}

fn render(result: &PredictionResult, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(result);
    }

    match (result.predicted_weight, result.risk_score) {
        (Some(grams), _) => {
            println!("{} {}", "Predicted weight:".bold(), format_grams(grams));
            if let Some(category) = &result.weight_category {
                println!("{} {}", "Category:".bold(), category);
            }
        }
        (None, Some(score)) => {
            println!("{} {:.1} / 100", "Risk score:".bold(), score);
            if let Some(assessment) = &result.risk_assessment {
                println!("{} {}", "Assessment:".bold(), assessment);
            }
        }
        (None, None) => {}
    }
    println!("{} {}", "Risk level:".bold(), color_risk(&result.risk_level));
    println!("{} {}", "Confidence:".bold(), format_confidence(result.confidence));
    println!("{} {}", "Model:".bold(), result.model_version);
    if let Ok(at) = chrono::DateTime::parse_from_rfc3339(&result.prediction_timestamp) {
        println!("{} {}", "Predicted at:".bold(), at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"));
    }
    println!();
    println!("{}", result.recommendation);
    println!("{}", result.disclaimer.dimmed());
    Ok(())
}
