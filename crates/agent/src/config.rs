//! Agent configuration

use anyhow::{anyhow, ensure, Result};
use meter_agent_lib::aggregator::AggregatorConfig;
use serde::Deserialize;
use std::time::Duration;

/// Shortest sample interval the collection loop accepts
const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name used in structured logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for ingest, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Time represented by one sample, in seconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: f64,

    /// Tariff used for cost estimates, currency per kWh
    #[serde(default = "default_cost_per_kwh")]
    pub cost_per_kwh: f64,

    /// Trailing window size for spike detection
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Standard deviations above the mean that count as a spike
    #[serde(default = "default_threshold_multiplier")]
    pub threshold_multiplier: f64,

    /// Number of recent alerts kept for display
    #[serde(default = "default_alert_capacity")]
    pub alert_capacity: usize,

    /// Maximum readings kept for CSV export
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Run the built-in simulated meter
    #[serde(default = "default_simulate")]
    pub simulate: bool,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8000
}

fn default_sample_interval() -> f64 {
    2.0
}

fn default_cost_per_kwh() -> f64 {
    0.15
}

fn default_window_size() -> usize {
    20
}

fn default_threshold_multiplier() -> f64 {
    2.0
}

fn default_alert_capacity() -> usize {
    5
}

fn default_history_limit() -> usize {
    100_000
}

fn default_simulate() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            sample_interval_secs: default_sample_interval(),
            cost_per_kwh: default_cost_per_kwh(),
            window_size: default_window_size(),
            threshold_multiplier: default_threshold_multiplier(),
            alert_capacity: default_alert_capacity(),
            history_limit: default_history_limit(),
            simulate: default_simulate(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from `METER_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("METER").try_parsing(true))
            .build()?;

        let config: AgentConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.sample_interval()?;
        ensure!(
            self.cost_per_kwh.is_finite() && self.cost_per_kwh >= 0.0,
            "cost_per_kwh must not be negative, got {}",
            self.cost_per_kwh
        );
        ensure!(
            self.window_size >= 2,
            "window_size must be at least 2, got {}",
            self.window_size
        );
        ensure!(
            self.threshold_multiplier.is_finite() && self.threshold_multiplier >= 0.0,
            "threshold_multiplier must not be negative, got {}",
            self.threshold_multiplier
        );
        Ok(())
    }

    /// Sample interval as a `Duration`, at least one millisecond
    pub fn sample_interval(&self) -> Result<Duration> {
        let interval = Duration::try_from_secs_f64(self.sample_interval_secs).map_err(|_| {
            anyhow!(
                "sample_interval_secs must be a positive number of seconds, got {}",
                self.sample_interval_secs
            )
        })?;
        ensure!(
            interval >= MIN_SAMPLE_INTERVAL,
            "sample_interval_secs must be at least {}, got {}",
            MIN_SAMPLE_INTERVAL.as_secs_f64(),
            self.sample_interval_secs
        );
        Ok(interval)
    }

    pub fn aggregator_config(&self) -> Result<AggregatorConfig> {
        Ok(AggregatorConfig {
            window_size: self.window_size,
            threshold_multiplier: self.threshold_multiplier,
            sample_interval: self.sample_interval()?,
        })
    }
}
