//! Observability infrastructure for the power meter agent
//!
//! Provides:
//! - Prometheus metrics (ingest latency, reading/anomaly counters, power and energy gauges)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info, warn};

use crate::anomaly::{DetectorState, SpikeSeverity};
use crate::error::InvalidReadingError;
use crate::models::{IngestOutcome, Reading};
use crate::session::{SessionUpdate, SharedSession};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AgentMetricsInner {
    ingest_latency_seconds: Histogram,
    readings_ingested: IntCounter,
    readings_rejected: IntCounterVec,
    anomalies_detected: IntCounter,
    source_errors: IntCounter,
    current_power_watts: Gauge,
    cumulative_energy_kwh: Gauge,
    detector_active: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            ingest_latency_seconds: register_histogram!(
                "meter_agent_ingest_latency_seconds",
                "Time spent classifying and accumulating one reading",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register ingest_latency_seconds"),

            readings_ingested: register_int_counter!(
                "meter_agent_readings_ingested_total",
                "Total number of readings accepted by the aggregator"
            )
            .expect("Failed to register readings_ingested"),

            readings_rejected: register_int_counter_vec!(
                "meter_agent_readings_rejected_total",
                "Total number of readings rejected as invalid",
                &["reason"]
            )
            .expect("Failed to register readings_rejected"),

            anomalies_detected: register_int_counter!(
                "meter_agent_anomalies_detected_total",
                "Total number of power spikes detected"
            )
            .expect("Failed to register anomalies_detected"),

            source_errors: register_int_counter!(
                "meter_agent_source_errors_total",
                "Total number of failures reading from the meter source"
            )
            .expect("Failed to register source_errors"),

            current_power_watts: register_gauge!(
                "meter_agent_current_power_watts",
                "Power of the most recently accepted reading"
            )
            .expect("Failed to register current_power_watts"),

            cumulative_energy_kwh: register_gauge!(
                "meter_agent_cumulative_energy_kwh",
                "Energy integrated since the session started"
            )
            .expect("Failed to register cumulative_energy_kwh"),

            detector_active: register_int_gauge!(
                "meter_agent_detector_active",
                "1 once the trailing window is full and spike detection is enabled"
            )
            .expect("Failed to register detector_active"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record an ingest latency observation
    pub fn observe_ingest_latency(&self, duration_secs: f64) {
        self.inner().ingest_latency_seconds.observe(duration_secs);
    }

    /// Update counters and gauges from an accepted reading
    pub fn record_outcome(&self, outcome: &IngestOutcome) {
        let inner = self.inner();
        inner.readings_ingested.inc();
        if outcome.reading.is_anomaly {
            inner.anomalies_detected.inc();
        }
        inner.current_power_watts.set(outcome.reading.reading.power);
        inner.cumulative_energy_kwh.set(outcome.cumulative_energy_kwh);
        self.set_detector_state(outcome.state);
    }

    /// Increment rejected readings counter
    pub fn inc_readings_rejected(&self, reason: &str) {
        self.inner()
            .readings_rejected
            .with_label_values(&[reason])
            .inc();
    }

    /// Increment source errors counter
    pub fn inc_source_errors(&self) {
        self.inner().source_errors.inc();
    }

    pub fn set_detector_state(&self, state: DetectorState) {
        let active = matches!(state, DetectorState::Active) as i64;
        self.inner().detector_active.set(active);
    }

    /// Zero the session gauges after a reset
    pub fn reset_session(&self) {
        let inner = self.inner();
        inner.current_power_watts.set(0.0);
        inner.cumulative_energy_kwh.set(0.0);
        inner.detector_active.set(0);
    }
}

/// Structured logger for agent events
///
/// Provides consistent JSON-formatted logging for spikes, rejected
/// readings and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log a power spike detection
    pub fn log_power_spike(
        &self,
        device_id: &str,
        power: f64,
        expected_power: f64,
        z_score: f64,
        severity: SpikeSeverity,
    ) {
        match severity {
            SpikeSeverity::Critical => {
                warn!(
                    event = "power_spike_detected",
                    node = %self.node_name,
                    device_id = %device_id,
                    severity = %severity,
                    power_watts = power,
                    expected_watts = expected_power,
                    z_score = z_score,
                    "Critical power spike detected"
                );
            }
            SpikeSeverity::Warning | SpikeSeverity::High => {
                info!(
                    event = "power_spike_detected",
                    node = %self.node_name,
                    device_id = %device_id,
                    severity = %severity,
                    power_watts = power,
                    expected_watts = expected_power,
                    z_score = z_score,
                    "Power spike detected"
                );
            }
        }
    }

    /// Log a reading rejected by validation
    pub fn log_reading_rejected(&self, device_id: &str, power: f64, reason: &str) {
        warn!(
            event = "reading_rejected",
            node = %self.node_name,
            device_id = %device_id,
            power_watts = power,
            reason = %reason,
            "Invalid reading rejected"
        );
    }

    /// Log the detector leaving its warm-up period
    pub fn log_detector_active(&self, window_size: usize) {
        info!(
            event = "detector_active",
            node = %self.node_name,
            window_size = window_size,
            "Trailing window full, spike detection enabled"
        );
    }

    /// Log a session reset
    pub fn log_session_reset(&self, samples_discarded: u64) {
        info!(
            event = "session_reset",
            node = %self.node_name,
            samples_discarded = samples_discarded,
            "Meter session reset"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, source: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            source = %source,
            "Power meter agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Power meter agent shutting down"
        );
    }
}

/// Records readings into a session and emits the matching metrics and
/// structured events. Shared by every ingest path.
#[derive(Clone)]
pub struct IngestReporter {
    metrics: AgentMetrics,
    logger: StructuredLogger,
}

impl IngestReporter {
    pub fn new(metrics: AgentMetrics, logger: StructuredLogger) -> Self {
        Self { metrics, logger }
    }

    /// Record one reading, then report the outcome or the rejection
    pub async fn record(
        &self,
        session: &SharedSession,
        reading: Reading,
    ) -> Result<SessionUpdate, InvalidReadingError> {
        let device_id = reading.device_id.clone();
        let power = reading.power;

        let start = Instant::now();
        let (result, previous_state, window_size) = {
            let mut session = session.lock().await;
            let previous_state = session.aggregator().state();
            let window_size = session.aggregator().config().window_size;
            (session.record(reading), previous_state, window_size)
        };
        self.metrics
            .observe_ingest_latency(start.elapsed().as_secs_f64());

        match &result {
            Ok(update) => self.recorded(&update.outcome, previous_state, window_size),
            Err(e) => self.rejected(&device_id, power, e),
        }

        result
    }

    /// Report an accepted reading
    pub fn recorded(&self, outcome: &IngestOutcome, previous_state: DetectorState, window_size: usize) {
        self.metrics.record_outcome(outcome);

        if detector_activated(previous_state, outcome.state) {
            self.logger.log_detector_active(window_size);
        }

        if let Some(spike) = &outcome.spike {
            self.logger.log_power_spike(
                &outcome.reading.reading.device_id,
                spike.current_power,
                spike.expected_power,
                spike.z_score,
                spike.severity(),
            );
        }
    }

    /// Report a reading that failed validation
    pub fn rejected(&self, device_id: &str, power: f64, error: &InvalidReadingError) {
        self.metrics.inc_readings_rejected(error.reason());
        self.logger.log_reading_rejected(device_id, power, error.reason());
    }
}

/// True only on the ingest that fills the trailing window
pub fn detector_activated(previous: DetectorState, current: DetectorState) -> bool {
    previous == DetectorState::Warming && current == DetectorState::Active
}
