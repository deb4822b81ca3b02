//! Meter session: the aggregator plus the alert feed and reading history
//! that presentation layers read from.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::aggregator::{AggregatorConfig, StreamingAnomalyAggregator};
use crate::anomaly::{AlertFeed, SpikeAlert};
use crate::error::{ExportError, InvalidReadingError};
use crate::export::ReadingHistory;
use crate::models::{DashboardSummary, IngestOutcome, Reading};

/// Session shared between the collection loop and the HTTP API.
///
/// The mutex serializes every `ingest`.
pub type SharedSession = Arc<Mutex<MeterSession>>;

/// Result of recording one reading in a session
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub outcome: IngestOutcome,
    pub alert: Option<SpikeAlert>,
}

#[derive(Debug, Clone)]
pub struct MeterSession {
    aggregator: StreamingAnomalyAggregator,
    alerts: AlertFeed,
    history: ReadingHistory,
}

impl MeterSession {
    pub fn new(config: AggregatorConfig, alerts: AlertFeed, history: ReadingHistory) -> Self {
        Self {
            aggregator: StreamingAnomalyAggregator::new(config),
            alerts,
            history,
        }
    }

    /// Wrap the session for sharing across tasks
    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Ingest a reading and record the result for export and alerting
    pub fn record(&mut self, reading: Reading) -> Result<SessionUpdate, InvalidReadingError> {
        let outcome = self.aggregator.ingest(reading)?;
        let alert = self.alerts.record(&outcome.reading, outcome.spike.as_ref());
        self.history.push(outcome.reading.clone());

        Ok(SessionUpdate { outcome, alert })
    }

    /// Clear aggregator, alerts and history
    pub fn reset(&mut self) {
        self.aggregator.reset();
        self.alerts.clear();
        self.history.clear();
    }

    pub fn summary(&self, cost_per_kwh: f64) -> DashboardSummary {
        self.aggregator.summary(cost_per_kwh)
    }

    pub fn recent_alerts(&self) -> Vec<SpikeAlert> {
        self.alerts.recent()
    }

    pub fn export_csv(&self) -> Result<String, ExportError> {
        self.history.to_csv()
    }

    pub fn aggregator(&self) -> &StreamingAnomalyAggregator {
        &self.aggregator
    }

    pub fn history(&self) -> &ReadingHistory {
        &self.history
    }
}

impl Default for MeterSession {
    fn default() -> Self {
        Self::new(
            AggregatorConfig::default(),
            AlertFeed::default(),
            ReadingHistory::default(),
        )
    }
}
