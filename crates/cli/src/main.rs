//! Maternal Health Prediction CLI
//!
//! A command-line client for requesting predictions, retraining models and
//! running data ingestion against the prediction service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::{BabyWeightRequest, DiabetesRequest};
use commands::{data, health, models, predict};

/// Maternal Health Prediction CLI
#[derive(Parser)]
#[command(name = "mpred")]
#[command(author, version, about = "CLI for the Maternal Health Prediction Service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via MPRED_API_URL env var)
    #[arg(long, env = "MPRED_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Request a prediction
    #[command(subcommand)]
    Predict(PredictCommands),

    /// Retrain a model
    Train {
        /// Task to retrain
        #[arg(value_enum)]
        task: models::Task,

        /// CSV file on the server to train from (upload directory or synthetic data otherwise)
        #[arg(long)]
        data_file: Option<String>,
    },

    /// Evaluate the current model on a CSV file
    Evaluate {
        /// Task to evaluate
        #[arg(value_enum)]
        task: models::Task,

        /// CSV file on the server in the training schema
        #[arg(long)]
        data_file: String,
    },

    /// Data ingestion
    #[command(subcommand)]
    Data(DataCommands),

    /// Show service and model health
    Health,
}

#[derive(Subcommand)]
pub enum PredictCommands {
    /// Estimate birth weight in grams
    Weight {
        /// Gestational age in weeks (20-45)
        #[arg(long)]
        gestational_age: f64,

        /// Maternal age in years (13-60)
        #[arg(long)]
        age: u32,

        /// Maternal height in cm (120-220)
        #[arg(long)]
        height: f64,

        /// Maternal weight in kg (30-200)
        #[arg(long)]
        weight: f64,

        /// Number of previous pregnancies (0-10)
        #[arg(long, default_value_t = 0)]
        parity: u32,

        /// Mother smokes
        #[arg(long)]
        smoker: bool,
    },

    /// Assess gestational diabetes risk
    Diabetes {
        /// Age in years (13-60)
        #[arg(long)]
        age: u32,

        /// Pregnancy number (1-10)
        #[arg(long, default_value_t = 1)]
        pregnancy_no: u32,

        /// Weight in kg (30-200)
        #[arg(long)]
        weight: f64,

        /// Height in cm (120-220)
        #[arg(long)]
        height: f64,

        /// BMI (15-60); derived from weight and height if omitted
        #[arg(long)]
        bmi: Option<f64>,

        /// Family history of diabetes
        #[arg(long)]
        heredity: bool,
    },
}

#[derive(Subcommand)]
pub enum DataCommands {
    /// Process uploaded files (all CSV files in the upload directory by default)
    Upload {
        /// Single file on the server to process
        #[arg(long)]
        file: Option<String>,
    },

    /// List uploaded and processed files
    Summary,
}

async fn run(cli: Cli) -> Result<()> {
    let file_config = config::Config::load()?;
    let api_url = config::resolve_api_url(cli.api_url, &file_config);
    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Predict(predict_cmd) => match predict_cmd {
            PredictCommands::Weight {
                gestational_age,
                age,
                height,
                weight,
                parity,
                smoker,
            } => {
                let request = BabyWeightRequest {
                    gestational_age,
                    maternal_age: age,
                    maternal_height: height,
                    maternal_weight: weight,
                    previous_pregnancies: parity,
                    smoking_status: u32::from(smoker),
                };
                predict::predict_weight(&client, request, cli.format).await?;
            }
            PredictCommands::Diabetes {
                age,
                pregnancy_no,
                weight,
                height,
                bmi,
                heredity,
            } => {
                let request = DiabetesRequest {
                    age,
                    pregnancy_no,
                    weight,
                    height,
                    bmi: bmi.unwrap_or_else(|| predict::derive_bmi(weight, height)),
                    heredity: u32::from(heredity),
                };
                predict::predict_diabetes(&client, request, cli.format).await?;
            }
        },
        Commands::Train { task, data_file } => {
            models::train(&client, task, data_file, cli.format).await?;
        }
        Commands::Evaluate { task, data_file } => {
            models::evaluate(&client, task, data_file, cli.format).await?;
        }
        Commands::Data(data_cmd) => match data_cmd {
            DataCommands::Upload { file } => {
                data::upload(&client, file, cli.format).await?;
            }
            DataCommands::Summary => {
                data::summary(&client, cli.format).await?;
            }
        },
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
