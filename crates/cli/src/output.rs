//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use meter_agent_lib::anomaly::{DetectorState, SpikeSeverity};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format power in watts, switching to kW above 1000 W
pub fn format_watts(watts: f64) -> String {
    if watts.abs() >= 1000.0 {
        format!("{:.2} kW", watts / 1000.0)
    } else {
        format!("{:.2} W", watts)
    }
}

/// Format energy, switching to Wh below 1 kWh
pub fn format_kwh(kwh: f64) -> String {
    if kwh.abs() < 1.0 {
        format!("{:.2} Wh", kwh * 1000.0)
    } else {
        format!("{:.4} kWh", kwh)
    }
}

/// Format currency
pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Color detector state
pub fn color_state(state: DetectorState) -> String {
    let label = state.to_string();
    match state {
        DetectorState::Warming => label.yellow().to_string(),
        DetectorState::Active => label.green().to_string(),
    }
}

/// Color spike severity
pub fn color_severity(severity: SpikeSeverity) -> String {
    let label = severity.to_string();
    match severity {
        SpikeSeverity::Warning => label.yellow().to_string(),
        SpikeSeverity::High => label.red().to_string(),
        SpikeSeverity::Critical => label.red().bold().to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" | "success" => status.green().to_string(),
        "degraded" | "warming" => status.yellow().to_string(),
        "unhealthy" | "error" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}
