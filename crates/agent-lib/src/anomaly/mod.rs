//! Anomaly detection for power readings
//!
//! This module provides:
//! - Power spike detection over a fixed trailing window
//! - A bounded feed of recent spike alerts

mod alerter;
mod spike_detector;

pub use alerter::{AlertFeed, SpikeAlert, DEFAULT_ALERT_CAPACITY};
pub use spike_detector::{
    DetectorState, RollingWindow, SpikeAnomaly, SpikeDetector, SpikeSeverity,
    DEFAULT_THRESHOLD_MULTIPLIER, DEFAULT_WINDOW_SIZE,
};
