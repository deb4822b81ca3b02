//! Streaming anomaly aggregator
//!
//! Turns raw power readings into annotated readings and keeps the derived
//! usage statistics. Each call to [`StreamingAnomalyAggregator::ingest`] is a
//! synchronous state transition; callers that share an aggregator across
//! tasks must serialize access themselves (the agent wraps it in a mutex).

use std::time::Duration;

use crate::anomaly::{
    DetectorState, RollingWindow, SpikeDetector, DEFAULT_THRESHOLD_MULTIPLIER,
    DEFAULT_WINDOW_SIZE,
};
use crate::error::InvalidReadingError;
use crate::models::{AnnotatedReading, DashboardSummary, IngestOutcome, Reading, UsageSnapshot};
use crate::usage::{UsageAccumulator, DEFAULT_SAMPLE_INTERVAL};

/// Configuration for the aggregator
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    /// Trailing window size N (default: 20)
    pub window_size: usize,
    /// Standard deviations above the mean that count as a spike (default: 2.0)
    pub threshold_multiplier: f64,
    /// Time represented by one sample (default: 2 seconds)
    pub sample_interval: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            threshold_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

/// Rolling spike detector plus energy accumulator
#[derive(Debug, Clone)]
pub struct StreamingAnomalyAggregator {
    config: AggregatorConfig,
    detector: SpikeDetector,
    window: RollingWindow,
    usage: UsageAccumulator,
    anomaly_count: u64,
}

impl StreamingAnomalyAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            detector: SpikeDetector::new(config.threshold_multiplier),
            window: RollingWindow::new(config.window_size),
            usage: UsageAccumulator::new(config.sample_interval),
            anomaly_count: 0,
            config,
        }
    }

    /// Classify a reading and fold it into the usage totals
    ///
    /// Invalid power values are rejected before any state is touched.
    pub fn ingest(&mut self, reading: Reading) -> Result<IngestOutcome, InvalidReadingError> {
        let power = InvalidReadingError::check_power(reading.power)?;

        self.window.push(power);
        let spike = self.detector.detect(power, &self.window);
        let is_anomaly = spike.is_some();
        if is_anomaly {
            self.anomaly_count += 1;
        }

        let cumulative_energy_kwh = self.usage.add_sample(power);

        Ok(IngestOutcome {
            reading: AnnotatedReading {
                reading,
                is_anomaly,
            },
            cumulative_energy_kwh,
            state: self.window.state(),
            spike,
        })
    }

    /// Monthly bill estimate for a tariff in currency per kWh
    pub fn estimated_monthly_cost(&self, cost_per_kwh: f64) -> f64 {
        self.usage.estimated_monthly_cost(cost_per_kwh)
    }

    /// Return to the freshly constructed state, keeping the configuration
    pub fn reset(&mut self) {
        self.window.clear();
        self.usage.reset();
        self.anomaly_count = 0;
    }

    pub fn cumulative_energy_kwh(&self) -> f64 {
        self.usage.cumulative_energy_kwh()
    }

    pub fn state(&self) -> DetectorState {
        self.window.state()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn samples_ingested(&self) -> u64 {
        self.usage.samples()
    }

    pub fn anomaly_count(&self) -> u64 {
        self.anomaly_count
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Snapshot of every derived statistic for a given tariff
    pub fn summary(&self, cost_per_kwh: f64) -> DashboardSummary {
        DashboardSummary {
            current_power_watts: self.window.latest(),
            cumulative_energy_kwh: self.cumulative_energy_kwh(),
            cost_per_kwh,
            estimated_monthly_cost: self.estimated_monthly_cost(cost_per_kwh),
            anomaly_count: self.anomaly_count,
            samples_ingested: self.samples_ingested(),
            detector_state: self.state(),
            window_len: self.window.len(),
            window_size: self.window.capacity(),
        }
    }
}

impl Default for StreamingAnomalyAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}
