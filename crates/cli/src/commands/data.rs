//! Data ingestion commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, BatchOutcome, DataSummary, UploadRequest};
use crate::output::{color_status, print_info, print_json, print_rows, print_warning, OutputFormat};

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "File")]
    filename: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Type")]
    data_type: String,
    #[tabled(rename = "Rows in/out")]
    rows: String,
    #[tabled(rename = "Quality")]
    quality: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn upload(client: &ApiClient, file: Option<String>, format: OutputFormat) -> Result<()> {
    let request = UploadRequest { file_path: file };
    let outcome: BatchOutcome = client.post("upload-data", &request).await?;

    if let OutputFormat::Json = format {
        return print_json(&outcome);
    }

    if let Some(message) = &outcome.message {
        print_warning(message);
    }
    let rows = outcome
        .processed_files
        .iter()
        .map(|f| FileRow {
            filename: f.filename.clone(),
            status: color_status(&f.status),
            data_type: f.data_type.clone().unwrap_or_default(),
            rows: match (f.original_records, f.processed_records) {
                (Some(a), Some(b)) => format!("{a}/{b}"),
                _ => String::new(),
            },
            quality: f.quality_score.map(|q| format!("{q:.2}")).unwrap_or_default(),
            message: f.message.clone().unwrap_or_default(),
        })
        .collect::<Vec<_>>();
    if !rows.is_empty() {
        print_rows(rows, "No files processed");
    }
    Ok(())
}

pub async fn summary(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let summary: DataSummary = client.get("data/summary").await?;

    if let OutputFormat::Json = format {
        return print_json(&summary);
    }

    print_info(&format!("Uploads ({}):", summary.upload_directory));
    list(&summary.uploaded_files);
    print_info(&format!("Processed ({}):", summary.processed_directory));
    list(&summary.processed_files);
    Ok(())
}

fn list(files: &[String]) {
    if files.is_empty() {
        println!("  (none)");
    }
    for file in files {
        println!("  {file}");
    }
}
