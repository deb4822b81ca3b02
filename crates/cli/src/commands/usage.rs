//! Usage, cost and alert commands

use anyhow::{ensure, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use meter_agent_lib::{anomaly::SpikeAlert, DashboardSummary};

use crate::client::{ApiClient, EnergyPayload, IngestResponse};
use crate::output::{
    color_severity, color_state, format_currency, format_kwh, format_watts, print_info,
    print_success, print_table, print_warning, OutputFormat,
};

/// Row for alert table
#[derive(Tabled, Serialize)]
struct AlertRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Device")]
    device_id: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&SpikeAlert> for AlertRow {
    fn from(alert: &SpikeAlert) -> Self {
        Self {
            time: alert.time.clone(),
            device_id: alert.device_id.clone(),
            severity: color_severity(alert.severity),
            message: alert.message.clone(),
        }
    }
}

/// Show usage and cost summary
pub async fn show_summary(
    client: &ApiClient,
    cost_per_kwh: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let path = match cost_per_kwh {
        Some(cost) => format!("api/summary?cost_per_kwh={}", cost),
        None => "api/summary".to_string(),
    };

    let summary: DashboardSummary = client.get(&path).await?;
    print_summary(&summary, format)
}

/// Render a dashboard summary
pub fn print_summary(summary: &DashboardSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Table => {
            println!("{}", "Energy Summary".bold());
            println!("{}", "=".repeat(50));

            match summary.current_power_watts {
                Some(watts) => println!("Current Power:          {}", format_watts(watts).cyan()),
                None => println!("Current Power:          {}", "no readings yet".dimmed()),
            }
            println!(
                "Energy Used:            {}",
                format_kwh(summary.cumulative_energy_kwh)
            );
            println!("Samples:                {}", summary.samples_ingested);
            println!();

            println!("{}", "Cost Estimate".bold());
            println!("{}", "-".repeat(50));
            println!(
                "Tariff:                 {} / kWh",
                format_currency(summary.cost_per_kwh)
            );
            println!(
                "{} {}",
                "Est. Monthly Cost:     ".bold(),
                format_currency(summary.estimated_monthly_cost).green().bold()
            );
            println!();

            println!("{}", "Spike Detection".bold());
            println!("{}", "-".repeat(50));
            println!(
                "Detector:               {} ({}/{} samples)",
                color_state(summary.detector_state),
                summary.window_len,
                summary.window_size
            );
            let anomalies = summary.anomaly_count.to_string();
            if summary.anomaly_count > 0 {
                println!("Anomalies:              {}", anomalies.red().bold());
            } else {
                println!("Anomalies:              {}", anomalies.green());
            }
        }
    }

    Ok(())
}

/// Show recent spike alerts
pub async fn show_alerts(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let alerts: Vec<SpikeAlert> = client.get("api/alerts").await?;
    print_alerts(&alerts, format);
    Ok(())
}

/// Render alerts, newest first
pub fn print_alerts(alerts: &[SpikeAlert], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(alerts) {
                println!("{}", json);
            }
        }
        OutputFormat::Table => {
            if alerts.is_empty() {
                print_info("No spikes detected");
                return;
            }
            let rows: Vec<AlertRow> = alerts.iter().map(AlertRow::from).collect();
            print_table(&rows, format);
        }
    }
}

/// Post a single reading to the agent
pub async fn send_reading(
    client: &ApiClient,
    device_id: String,
    voltage: f64,
    power: f64,
    format: OutputFormat,
) -> Result<()> {
    ensure!(voltage > 0.0, "voltage must be positive, got {}", voltage);

    let payload = EnergyPayload {
        device_id,
        voltage,
        current: power / voltage,
        power,
    };

    let result: IngestResponse = client.post("api/data", &payload).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Table => {
            let reading = &result.processed_data;
            if reading.is_anomaly {
                print_warning(&format!(
                    "Power spike detected: {:.2} W",
                    reading.reading.power
                ));
            } else {
                print_success(&format!(
                    "Reading accepted: {}",
                    format_watts(reading.reading.power)
                ));
            }
        }
    }

    Ok(())
}
