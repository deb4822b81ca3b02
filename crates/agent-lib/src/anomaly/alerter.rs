//! Alert feed for detected power spikes
//!
//! Keeps the most recent spike alerts, newest first, for display next to
//! the live chart. Older alerts fall off the end once the feed is full.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SpikeAnomaly, SpikeSeverity};
use crate::models::AnnotatedReading;

/// Default number of alerts kept in the feed
pub const DEFAULT_ALERT_CAPACITY: usize = 5;

/// A single spike alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeAlert {
    pub device_id: String,
    pub message: String,
    /// Wall-clock label of the offending reading
    pub time: String,
    pub power: f64,
    pub severity: SpikeSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl SpikeAlert {
    /// Build an alert for an anomalous reading
    pub fn from_reading(reading: &AnnotatedReading, spike: Option<&SpikeAnomaly>) -> Self {
        let power = reading.reading.power;
        Self {
            device_id: reading.reading.device_id.clone(),
            message: format!("Power spike detected: {:.2} W", power),
            time: reading.reading.time_label(),
            power,
            severity: spike
                .map(SpikeAnomaly::severity)
                .unwrap_or(SpikeSeverity::Warning),
            z_score: spike.map(|s| s.z_score),
            timestamp: reading.reading.timestamp,
        }
    }
}

/// Bounded, newest-first list of spike alerts
#[derive(Debug, Clone)]
pub struct AlertFeed {
    alerts: VecDeque<SpikeAlert>,
    capacity: usize,
    /// Alerts ever recorded, including ones that fell off the feed
    total: u64,
}

impl AlertFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    /// Record an annotated reading, returning the alert if one was raised
    pub fn record(
        &mut self,
        reading: &AnnotatedReading,
        spike: Option<&SpikeAnomaly>,
    ) -> Option<SpikeAlert> {
        if !reading.is_anomaly {
            return None;
        }

        let alert = SpikeAlert::from_reading(reading, spike);
        self.total += 1;

        if self.capacity == 0 {
            return Some(alert);
        }

        self.alerts.push_front(alert.clone());
        self.alerts.truncate(self.capacity);

        Some(alert)
    }

    /// Alerts, newest first
    pub fn recent(&self) -> Vec<SpikeAlert> {
        self.alerts.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
        self.total = 0;
    }
}

impl Default for AlertFeed {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_CAPACITY)
    }
}
