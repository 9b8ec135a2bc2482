//! Service health command

use anyhow::{Context, Result};
use tabled::Tabled;

use crate::client::{ApiClient, HealthReport};
use crate::output::{color_status, print_json, print_rows, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthReport = client
        .get("health")
        .await
        .with_context(|| format!("Service at {} is not healthy", client.base_url()))?;

    if let OutputFormat::Json = format {
        return print_json(&health);
    }

    println!("Service: {}", color_status(&health.status));
    let rows = health
        .components
        .iter()
        .map(|(name, component)| {
            let model = health
                .models
                .get(name)
                .map(|m| match (&m.version, &m.algorithm) {
                    (Some(version), Some(algorithm)) => format!("{version} ({algorithm})"),
                    _ => m.state.clone(),
                })
                .unwrap_or_default();
            ComponentRow {
                name: name.clone(),
                status: color_status(&component.status),
                model,
                message: component.message.clone().unwrap_or_default(),
            }
        })
        .collect();
    print_rows(rows, "No components registered");
    Ok(())
}
