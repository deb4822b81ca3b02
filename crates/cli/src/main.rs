//! Power Meter CLI
//!
//! A command-line tool for querying a running meter agent, pushing
//! readings to it, and running the spike detection pipeline offline.

mod client;
mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{export, simulate, status, usage};

/// Tariff used when neither flag nor config file sets one
const DEFAULT_COST_PER_KWH: f64 = 0.15;

/// Power Meter CLI
#[derive(Parser)]
#[command(name = "pmeter")]
#[command(author, version, about = "CLI for the Power Meter agent", long_about = None)]
pub struct Cli {
    /// Agent URL (can also be set via PMETER_API_URL or the config file)
    #[arg(long, env = "PMETER_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show agent health and detector warm-up
    Status,

    /// Show energy usage and estimated monthly cost
    Summary {
        /// Tariff in currency per kWh (defaults to the agent's setting)
        #[arg(long)]
        cost_per_kwh: Option<f64>,
    },

    /// Show recent power spike alerts
    Alerts,

    /// Download the session history as CSV
    Export {
        /// Output file path
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Send a single reading to the agent
    Send {
        /// Power in watts
        #[arg(long)]
        power: f64,

        /// Supply voltage in volts
        #[arg(long, default_value_t = 220.0)]
        voltage: f64,

        /// Device identifier
        #[arg(long, default_value = "ESP32_01")]
        device_id: String,
    },

    /// Discard the agent's current session
    Reset,

    /// Save defaults to ~/.config/pmeter/config.json
    Configure {
        /// Agent URL to use by default
        #[arg(long)]
        api_url: Option<String>,

        /// Tariff in currency per kWh to use by default
        #[arg(long)]
        cost_per_kwh: Option<f64>,
    },

    /// Run the simulated meter offline and report the result
    Simulate {
        /// Number of readings to generate
        #[arg(long, short = 'n', default_value_t = 100)]
        count: usize,

        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Seconds represented by each reading
        #[arg(long, default_value_t = 2.0)]
        interval: f64,

        /// Tariff in currency per kWh
        #[arg(long)]
        cost_per_kwh: Option<f64>,

        /// Write the generated history as CSV
        #[arg(long, short)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let api_url = config.resolve_api_url(cli.api_url.as_deref());

    if cli.verbose {
        output::print_info(&format!("Using agent at {}", api_url));
    }

    match cli.command {
        // Offline, needs no agent
        Commands::Simulate {
            count,
            seed,
            interval,
            cost_per_kwh,
            output,
        } => {
            let options = simulate::SimulationOptions {
                count,
                seed,
                interval_secs: interval,
                cost_per_kwh: cost_per_kwh
                    .or(config.cost_per_kwh)
                    .unwrap_or(DEFAULT_COST_PER_KWH),
                output,
            };
            simulate::simulate(options, cli.format)?;
        }
        Commands::Configure {
            api_url,
            cost_per_kwh,
        } => {
            let mut config = config;
            if let Some(url) = api_url {
                url::Url::parse(&url).context("Invalid API URL")?;
                config.api_url = Some(url);
            }
            if let Some(cost) = cost_per_kwh {
                anyhow::ensure!(cost >= 0.0, "cost_per_kwh must not be negative, got {}", cost);
                config.cost_per_kwh = Some(cost);
            }
            let path = config.save()?;
            output::print_success(&format!("Saved configuration to {}", path.display()));
        }
        command => {
            let client = client::ApiClient::new(&api_url)?;
            run_remote(&client, command, &config, cli.format).await?;
        }
    }

    Ok(())
}

async fn run_remote(
    client: &client::ApiClient,
    command: Commands,
    config: &config::Config,
    format: output::OutputFormat,
) -> Result<()> {
    match command {
        Commands::Status => {
            status::show_status(client, format).await?;
        }
        Commands::Summary { cost_per_kwh } => {
            usage::show_summary(client, cost_per_kwh.or(config.cost_per_kwh), format).await?;
        }
        Commands::Alerts => {
            usage::show_alerts(client, format).await?;
        }
        Commands::Export { output } => {
            export::export_csv(client, output).await?;
        }
        Commands::Send {
            power,
            voltage,
            device_id,
        } => {
            usage::send_reading(client, device_id, voltage, power, format).await?;
        }
        Commands::Reset => {
            status::reset_session(client, format).await?;
        }
        Commands::Simulate { .. } | Commands::Configure { .. } => {
            anyhow::bail!("command runs locally and needs no agent");
        }
    }

    Ok(())
}
