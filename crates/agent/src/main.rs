//! Power Meter Agent
//!
//! Samples a power meter at a fixed cadence (or accepts readings over
//! HTTP), flags power spikes and serves usage statistics.

use anyhow::Result;
use meter_agent::{api, config::AgentConfig};
use meter_agent_lib::{
    anomaly::AlertFeed,
    collector::{CollectionLoopBuilder, SimulatedMeter},
    export::ReadingHistory,
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    MeterSession,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting meter-agent");

    let config = AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        interval_secs = config.sample_interval_secs,
        window_size = config.window_size,
        simulate = config.simulate,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::API).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let session = MeterSession::new(
        config.aggregator_config()?,
        AlertFeed::new(config.alert_capacity),
        ReadingHistory::new(config.history_limit),
    )
    .shared();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut loop_handle = None;

    if config.simulate {
        health_registry.register(components::SOURCE).await;

        let (collection_loop, mut updates_rx) = CollectionLoopBuilder::new()
            .source(Arc::new(SimulatedMeter::default()))
            .session(session.clone())
            .logger(logger.clone())
            .health(health_registry.clone())
            .interval(config.sample_interval()?)
            .build()?;

        loop_handle = Some(collection_loop.spawn(shutdown_tx.subscribe()));

        // Drain updates so the loop never blocks on a full channel
        tokio::spawn(async move {
            while let Some(update) = updates_rx.recv().await {
                debug!(
                    power_watts = update.outcome.reading.reading.power,
                    is_anomaly = update.outcome.reading.is_anomaly,
                    cumulative_energy_kwh = update.outcome.cumulative_energy_kwh,
                    "Reading recorded"
                );
            }
        });
    }

    logger.log_startup(
        AGENT_VERSION,
        if config.simulate { "simulator" } else { "http" },
    );

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        logger.clone(),
        session,
        config.cost_per_kwh,
    ));

    health_registry.set_ready(true).await;

    let api_health = health_registry.clone();
    let api_port = config.api_port;
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
            api_health
                .set_unhealthy(components::API, e.to_string())
                .await;
        }
    });

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    if let Some(handle) = loop_handle {
        let _ = handle.await;
    }
    api_handle.abort();

    info!("Shutting down");
    Ok(())
}
