//! Training and evaluation commands

use anyhow::Result;
use clap::ValueEnum;
use tabled::Tabled;

use crate::client::{ApiClient, DataFileRequest, EvaluationReport, TrainResponse};
use crate::output::{format_score, print_info, print_json, print_rows, print_success, OutputFormat};

/// Prediction task addressed by a command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Task {
    BabyWeight,
    Diabetes,
}

impl Task {
    /// Path segment used by the API
    pub fn slug(&self) -> &'static str {
        match self {
            Task::BabyWeight => "baby-weight",
            Task::Diabetes => "diabetes",
        }
    }
}

/// Row for the candidate leaderboard
#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "Algorithm")]
    algorithm: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Fit (ms)")]
    fit_ms: u64,
    #[tabled(rename = "Selected")]
    selected: String,
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub async fn train(client: &ApiClient, task: Task, data_file: Option<String>, format: OutputFormat) -> Result<()> {
    let request = DataFileRequest {
        data_file_path: data_file,
    };
    let response: TrainResponse = client.post(&format!("train/{}", task.slug()), &request).await?;

    if let OutputFormat::Json = format {
        return print_json(&response);
    }

    let report = &response.report;
    print_success(&response.message);
    print_info(&format!(
        "{} model {} selected {} ({} = {:.4}) on {} train / {} test rows in {:.1}s",
        report.task,
        report.model_version,
        report.algorithm,
        report.metric,
        report.score,
        report.train_rows,
        report.test_rows,
        report.training_time_seconds
    ));

    let rows = report
        .leaderboard
        .iter()
        .map(|c| CandidateRow {
            algorithm: c.algorithm.clone(),
            score: format_score(Some(c.score)),
            fit_ms: c.fit_ms,
            selected: if c.algorithm == report.algorithm { "*".to_string() } else { String::new() },
        })
        .collect();
    print_rows(rows, "No candidates reported");
    Ok(())
}

pub async fn evaluate(client: &ApiClient, task: Task, data_file: String, format: OutputFormat) -> Result<()> {
    let request = DataFileRequest {
        data_file_path: Some(data_file),
    };
    let report: EvaluationReport = client.post(&format!("evaluate/{}", task.slug()), &request).await?;

    if let OutputFormat::Json = format {
        return print_json(&report);
    }

    print_info(&format!(
        "{} model {} evaluated on {} rows",
        report.task, report.model_version, report.rows
    ));
    let rows = report
        .metrics
        .iter()
        .map(|(metric, value)| MetricRow {
            metric: metric.clone(),
            value: format_score(*value),
        })
        .collect();
    print_rows(rows, "No metrics reported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_slugs() {
        assert_eq!(Task::BabyWeight.slug(), "baby-weight");
        assert_eq!(Task::Diabetes.slug(), "diabetes");
    }
}
