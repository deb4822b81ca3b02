//! Reading collection loop
//!
//! Pulls one reading from a source per tick and records it in the shared
//! session. The cadence is fixed: energy integration assumes every sample
//! represents exactly one interval.

use super::ReadingSource;
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::observability::{AgentMetrics, IngestReporter, StructuredLogger};
use crate::session::{SessionUpdate, SharedSession};
use crate::usage::DEFAULT_SAMPLE_INTERVAL;
use anyhow::{ensure, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Sampling interval (default: 2 seconds)
    pub interval: Duration,
    /// Channel buffer size for session updates
    pub buffer_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SAMPLE_INTERVAL,
            buffer_size: 256,
        }
    }
}

/// What happened on a single tick
#[derive(Debug)]
enum TickResult {
    Recorded(Box<SessionUpdate>),
    Rejected,
    SourceError,
}

/// Loop that samples a reading source at a fixed cadence
pub struct CollectionLoop {
    source: Arc<dyn ReadingSource>,
    session: SharedSession,
    config: CollectionConfig,
    updates_tx: mpsc::Sender<SessionUpdate>,
    metrics: AgentMetrics,
    reporter: IngestReporter,
    health: Option<HealthRegistry>,
}

impl CollectionLoop {
    /// Create a new collection loop
    pub fn new(
        source: Arc<dyn ReadingSource>,
        session: SharedSession,
        config: CollectionConfig,
        logger: StructuredLogger,
    ) -> (Self, mpsc::Receiver<SessionUpdate>) {
        let (updates_tx, updates_rx) = mpsc::channel(config.buffer_size.max(1));
        let metrics = AgentMetrics::new();

        let loop_instance = Self {
            source,
            session,
            config,
            updates_tx,
            reporter: IngestReporter::new(metrics.clone(), logger),
            metrics,
            health: None,
        };

        (loop_instance, updates_rx)
    }

    /// Report source failures to a health registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Run until a shutdown signal arrives
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            source = self.source.name(),
            "Starting reading collection loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick_count = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tick_count += 1;
                    if let TickResult::Recorded(update) = self.tick().await {
                        if self.updates_tx.send(*update).await.is_err() {
                            debug!("Update receiver dropped");
                        }
                    }

                    if tick_count % 30 == 0 {
                        debug!(ticks = tick_count, "Collection loop alive");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down reading collection loop");
                    break;
                }
            }
        }
    }

    /// Pull one reading and record it
    async fn tick(&self) -> TickResult {
        let reading = match self.source.next_reading().await {
            Ok(reading) => reading,
            Err(e) => {
                self.metrics.inc_source_errors();
                warn!(source = self.source.name(), error = %e, "Failed to read from meter");
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::SOURCE, format!("read failed: {}", e))
                        .await;
                }
                return TickResult::SourceError;
            }
        };

        if let Some(health) = &self.health {
            if health.status(components::SOURCE).await != Some(ComponentStatus::Healthy) {
                health.set_healthy(components::SOURCE).await;
            }
        }

        match self.reporter.record(&self.session, reading).await {
            Ok(update) => TickResult::Recorded(Box::new(update)),
            Err(_) => TickResult::Rejected,
        }
    }

    /// Run on a spawned task, marking the source unhealthy if the task dies
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let health = self.health.clone();
        let handle = tokio::spawn(self.run(shutdown));

        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!(error = %e, "Collection loop stopped");
                if let Some(health) = health {
                    health
                        .set_unhealthy(components::SOURCE, format!("collection loop stopped: {}", e))
                        .await;
                }
            }
        })
    }
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    source: Option<Arc<dyn ReadingSource>>,
    session: Option<SharedSession>,
    logger: Option<StructuredLogger>,
    health: Option<HealthRegistry>,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            source: None,
            session: None,
            logger: None,
            health: None,
            config: CollectionConfig::default(),
        }
    }

    /// Set the reading source
    pub fn source(mut self, source: Arc<dyn ReadingSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the session readings are recorded into
    pub fn session(mut self, session: SharedSession) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the structured logger
    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the health registry to report source status to
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Set the sampling interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the buffer size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Build the collection loop
    pub fn build(self) -> Result<(CollectionLoop, mpsc::Receiver<SessionUpdate>)> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Reading source is required"))?;
        let session = self
            .session
            .ok_or_else(|| anyhow::anyhow!("Session is required"))?;
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new("unknown"));

        ensure!(!self.config.interval.is_zero(), "Sampling interval must be non-zero");

        let (mut collection_loop, rx) = CollectionLoop::new(source, session, self.config, logger);
        if let Some(health) = self.health {
            collection_loop = collection_loop.with_health(health);
        }

        Ok((collection_loop, rx))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reading;
    use crate::session::MeterSession;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that replays a fixed list of power values
    struct ScriptedSource {
        powers: Vec<f64>,
        next: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(powers: Vec<f64>) -> Self {
            Self {
                powers,
                next: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReadingSource for ScriptedSource {
        async fn next_reading(&self) -> Result<Reading> {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            let power = *self
                .powers
                .get(i)
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))?;
            Ok(Reading::now("test-meter", 230.0, power / 230.0, power))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn build_loop(powers: Vec<f64>) -> (CollectionLoop, mpsc::Receiver<SessionUpdate>, SharedSession) {
        let session = MeterSession::default().shared();
        let (collection_loop, rx) = CollectionLoopBuilder::new()
            .source(Arc::new(ScriptedSource::new(powers)))
            .session(session.clone())
            .interval(Duration::from_millis(10))
            .build()
            .unwrap();
        (collection_loop, rx, session)
    }

    #[test]
    fn test_collection_config_default() {
        let config = CollectionConfig::default();
        assert_eq!(config.interval, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_builder_missing_source() {
        let result = CollectionLoopBuilder::new()
            .session(MeterSession::default().shared())
            .build();

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tick_records_reading() {
        let (collection_loop, _rx, session) = build_loop(vec![120.0]);

        let result = collection_loop.tick().await;
        assert!(matches!(result, TickResult::Recorded(_)));
        assert_eq!(session.lock().await.history().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_rejects_invalid_reading() {
        let (collection_loop, _rx, session) = build_loop(vec![-3.0]);

        let result = collection_loop.tick().await;
        assert!(matches!(result, TickResult::Rejected));
        assert!(session.lock().await.history().is_empty());
    }

    #[tokio::test]
    async fn test_tick_survives_source_error() {
        let (collection_loop, _rx, _session) = build_loop(vec![]);

        let result = collection_loop.tick().await;
        assert!(matches!(result, TickResult::SourceError));
    }

    #[tokio::test]
    async fn test_run_forwards_updates_until_shutdown() {
        let mut powers = vec![100.0; 19];
        powers.push(1000.0);
        let (collection_loop, mut rx, session) = build_loop(powers);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(collection_loop.run(shutdown_rx));

        let mut updates = Vec::new();
        while updates.len() < 20 {
            match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Some(update)) => updates.push(update),
                _ => break,
            }
        }

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(updates.len(), 20);
        assert!(updates[..19].iter().all(|u| !u.outcome.reading.is_anomaly));
        assert!(updates[19].outcome.reading.is_anomaly);
        assert!(updates[19].alert.is_some());
        assert_eq!(session.lock().await.recent_alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_source_error_degrades_health() {
        let health = HealthRegistry::new();
        health.register(components::SOURCE).await;

        let (collection_loop, _rx) = CollectionLoopBuilder::new()
            .source(Arc::new(ScriptedSource::new(vec![])))
            .session(MeterSession::default().shared())
            .health(health.clone())
            .build()
            .unwrap();

        collection_loop.tick().await;
        assert_eq!(
            health.status(components::SOURCE).await,
            Some(ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_interval() {
        let result = CollectionLoopBuilder::new()
            .source(Arc::new(ScriptedSource::new(vec![])))
            .session(MeterSession::default().shared())
            .interval(Duration::ZERO)
            .build();

        assert!(result.is_err());
    }

    /// Source whose read task panics
    struct PanickingSource;

    #[async_trait]
    impl ReadingSource for PanickingSource {
        async fn next_reading(&self) -> Result<Reading> {
            panic!("meter driver crashed");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_stopped_loop_marks_source_unhealthy() {
        let health = HealthRegistry::new();
        health.register(components::SOURCE).await;

        let (collection_loop, _rx) = CollectionLoopBuilder::new()
            .source(Arc::new(PanickingSource))
            .session(MeterSession::default().shared())
            .health(health.clone())
            .interval(Duration::from_millis(10))
            .build()
            .unwrap();

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::time::timeout(Duration::from_secs(5), collection_loop.spawn(shutdown_rx))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            health.status(components::SOURCE).await,
            Some(ComponentStatus::Unhealthy)
        );
    }
}
