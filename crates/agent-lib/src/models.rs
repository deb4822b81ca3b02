//! Core data models for the power meter agent

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::anomaly::{DetectorState, SpikeAnomaly};

/// A single power-meter sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub voltage: f64,
    pub current: f64,
    /// Active power in watts
    pub power: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Build a reading stamped with the current time
    pub fn now(device_id: impl Into<String>, voltage: f64, current: f64, power: f64) -> Self {
        Self {
            device_id: device_id.into(),
            voltage,
            current,
            power,
            timestamp: Utc::now(),
        }
    }

    /// Local wall-clock label, e.g. `3:04:05 PM`
    pub fn time_label(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%-I:%M:%S %p")
            .to_string()
    }
}

/// A reading after classification by the spike detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedReading {
    #[serde(flatten)]
    pub reading: Reading,
    pub is_anomaly: bool,
}

/// Result of ingesting one reading
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub reading: AnnotatedReading,
    /// Energy integrated so far, including this reading
    pub cumulative_energy_kwh: f64,
    /// Detector state after this reading
    pub state: DetectorState,
    /// Spike details when the reading was classified as anomalous
    pub spike: Option<SpikeAnomaly>,
}

/// Snapshot of the energy accumulator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub cumulative_energy_kwh: f64,
    pub sample_interval_secs: f64,
    pub samples: u64,
}

/// Read-only statistics handed to presentation layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub current_power_watts: Option<f64>,
    pub cumulative_energy_kwh: f64,
    pub cost_per_kwh: f64,
    pub estimated_monthly_cost: f64,
    pub anomaly_count: u64,
    pub samples_ingested: u64,
    pub detector_state: DetectorState,
    pub window_len: usize,
    pub window_size: usize,
}
