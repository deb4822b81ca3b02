//! Power spike detection
//!
//! Detects power spikes by keeping the last N power values in a fixed-size
//! window and flagging a value that exceeds the window mean by a
//! configurable number of population standard deviations. The window always
//! includes the value under test.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of samples in the trailing window
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// Default number of standard deviations above the mean that counts as a spike
pub const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 2.0;

/// Detector lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorState {
    /// Fewer than N samples seen, detection disabled
    Warming,
    /// Window full, detection enabled
    Active,
}

impl std::fmt::Display for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorState::Warming => write!(f, "warming"),
            DetectorState::Active => write!(f, "active"),
        }
    }
}

/// Detects power spikes exceeding a standard deviation threshold
#[derive(Debug, Clone)]
pub struct SpikeDetector {
    /// Number of standard deviations to consider a spike
    pub threshold_multiplier: f64,
}

impl SpikeDetector {
    /// Create a new spike detector with given threshold
    pub fn new(threshold_multiplier: f64) -> Self {
        Self {
            threshold_multiplier,
        }
    }

    /// Classify `current` against a window that already contains it
    ///
    /// # Returns
    /// * `Some(SpikeAnomaly)` if `current > mean + k * std_dev`
    /// * `None` if the window is not full yet or no spike is detected
    pub fn detect(&self, current: f64, window: &RollingWindow) -> Option<SpikeAnomaly> {
        if !window.is_full() {
            return None;
        }

        let mean = window.mean();
        let std_dev = window.std_dev();

        if current > mean + self.threshold_multiplier * std_dev {
            // std_dev is non-zero here: a constant window has current == mean
            let z_score = if std_dev > 0.0 {
                (current - mean) / std_dev
            } else {
                f64::INFINITY
            };

            Some(SpikeAnomaly {
                current_power: current,
                expected_power: mean,
                z_score,
                std_dev,
                threshold: self.threshold_multiplier,
            })
        } else {
            None
        }
    }
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_MULTIPLIER)
    }
}

/// Fixed-capacity trailing window of power values
///
/// Mean and population standard deviation are recomputed with a two-pass
/// scan on every push.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
    mean: f64,
    std_dev: f64,
}

impl RollingWindow {
    /// Create an empty window holding at most `capacity` values
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity + 1),
            capacity,
            mean: 0.0,
            std_dev: 0.0,
        }
    }

    /// Append a value, evicting and returning the oldest one on overflow
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        let evicted = if self.values.len() > self.capacity {
            self.values.pop_front()
        } else {
            None
        };

        self.recalculate_stats();
        evicted
    }

    /// Drop every value
    pub fn clear(&mut self) {
        self.values.clear();
        self.mean = 0.0;
        self.std_dev = 0.0;
    }

    fn recalculate_stats(&mut self) {
        let n = self.values.len();
        if n == 0 {
            self.mean = 0.0;
            self.std_dev = 0.0;
            return;
        }

        let count = n as f64;
        self.mean = self.values.iter().sum::<f64>() / count;

        // Population variance (divide by N)
        let variance = self
            .values
            .iter()
            .map(|v| (v - self.mean).powi(2))
            .sum::<f64>()
            / count;
        self.std_dev = variance.sqrt();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the window holds `capacity` values
    pub fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation of the window
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Most recently pushed value
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Values from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    /// Get the minimum value in the window
    pub fn min(&self) -> Option<f64> {
        self.values
            .iter()
            .copied()
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Get the maximum value in the window
    pub fn max(&self) -> Option<f64> {
        self.values
            .iter()
            .copied()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Current detector state implied by the window fill
    pub fn state(&self) -> DetectorState {
        if self.is_full() {
            DetectorState::Active
        } else {
            DetectorState::Warming
        }
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

/// Power spike anomaly details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeAnomaly {
    /// Power that triggered the spike
    pub current_power: f64,
    /// Window mean, including the spike itself
    pub expected_power: f64,
    /// Z-score (number of standard deviations from mean)
    pub z_score: f64,
    /// Population standard deviation of the window
    pub std_dev: f64,
    /// Threshold that was exceeded
    pub threshold: f64,
}

impl SpikeAnomaly {
    /// Get the percentage above the window mean
    pub fn percentage_above_expected(&self) -> f64 {
        if self.expected_power < f64::EPSILON {
            return 0.0;
        }
        ((self.current_power - self.expected_power) / self.expected_power) * 100.0
    }

    /// Get severity level based on z-score
    pub fn severity(&self) -> SpikeSeverity {
        if self.z_score >= 4.0 {
            SpikeSeverity::Critical
        } else if self.z_score >= 3.0 {
            SpikeSeverity::High
        } else {
            SpikeSeverity::Warning
        }
    }
}

/// Severity levels for power spikes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpikeSeverity {
    Warning,
    High,
    Critical,
}

impl std::fmt::Display for SpikeSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpikeSeverity::Warning => write!(f, "warning"),
            SpikeSeverity::High => write!(f, "high"),
            SpikeSeverity::Critical => write!(f, "critical"),
        }
    }
}
