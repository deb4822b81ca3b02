//! Agent status and session control commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use meter_agent_lib::{HealthResponse, ReadinessResponse};

use crate::client::{ApiClient, ResetResponse, StatusResponse};
use crate::output::{color_state, color_status, print_success, print_warning, OutputFormat};

/// Row for component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Show agent status, component health and detector warm-up
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: StatusResponse = client.get("api/status").await?;
    let health: HealthResponse = client.get("healthz").await?;
    // /readyz answers 503 while not ready, which is still a useful answer
    let readiness: Option<ReadinessResponse> = client.get("readyz").await.ok();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "status": status,
                "health": health,
                "readiness": readiness,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            println!("{}", "Meter Agent Status".bold());
            println!("{}", "=".repeat(50));
            println!("API:                    {}", color_status(&status.status));

            let overall = serde_json::to_value(health.status)?;
            println!(
                "Health:                 {}",
                color_status(overall.as_str().unwrap_or("unknown"))
            );

            match &readiness {
                Some(r) if r.ready => println!("Ready:                  {}", color_status("ready")),
                _ => println!("Ready:                  {}", color_status("not ready")),
            }

            if let Some(progress) = readiness.as_ref().and_then(|r| r.detector) {
                println!(
                    "Detector:               {} ({}/{} samples)",
                    color_state(progress.state),
                    progress.samples,
                    progress.window_size
                );
            }
            println!();

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: serde_json::to_value(component.status)
                        .ok()
                        .and_then(|v| v.as_str().map(color_status))
                        .unwrap_or_default(),
                    message: component.message.clone().unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

/// Reset the agent's session
pub async fn reset_session(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: ResetResponse = client.post_empty("api/reset").await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Table => {
            if result.samples_discarded == 0 {
                print_warning("Session was already empty");
            } else {
                print_success(&format!(
                    "Session reset, {} samples discarded",
                    result.samples_discarded
                ));
            }
        }
    }

    Ok(())
}
