//! HTTP API for reading ingest, dashboard queries, health checks and
//! Prometheus metrics

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use meter_agent_lib::{
    anomaly::SpikeAlert,
    health::{ComponentStatus, DetectorProgress, HealthRegistry},
    observability::{AgentMetrics, IngestReporter, StructuredLogger},
    AnnotatedReading, DashboardSummary, ExportError, InvalidReadingError, Reading, SharedSession,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// File name offered for the CSV download
const EXPORT_FILE_NAME: &str = "energy_data.csv";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: AgentMetrics,
    pub logger: StructuredLogger,
    pub reporter: IngestReporter,
    pub session: SharedSession,
    /// Default tariff for summaries, currency per kWh
    pub cost_per_kwh: f64,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: AgentMetrics,
        logger: StructuredLogger,
        session: SharedSession,
        cost_per_kwh: f64,
    ) -> Self {
        Self {
            reporter: IngestReporter::new(metrics.clone(), logger.clone()),
            health_registry,
            metrics,
            logger,
            session,
            cost_per_kwh,
        }
    }
}

/// Errors returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    InvalidReading(InvalidReadingError),
    Export(ExportError),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::InvalidReading(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Export(ExportError::Empty) => {
                (StatusCode::NOT_FOUND, "No data to export".to_string())
            }
            ApiError::Export(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "status": "error",
            "detail": detail,
        }));
        (status, body).into_response()
    }
}

/// Reading payload posted by a meter
#[derive(Debug, Clone, Deserialize)]
pub struct EnergyData {
    pub device_id: String,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    /// Stamped on arrival when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<EnergyData> for Reading {
    fn from(data: EnergyData) -> Self {
        Reading {
            device_id: data.device_id,
            voltage: data.voltage,
            current: data.current,
            power: data.power,
            timestamp: data.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub processed_data: AnnotatedReading,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub cost_per_kwh: Option<f64>,
}

/// Accept a reading from a meter
async fn receive_data(
    State(state): State<Arc<AppState>>,
    Json(data): Json<EnergyData>,
) -> Result<Json<IngestResponse>, ApiError> {
    let update = state
        .reporter
        .record(&state.session, Reading::from(data))
        .await
        .map_err(ApiError::InvalidReading)?;

    Ok(Json(IngestResponse {
        status: "success",
        processed_data: update.outcome.reading,
    }))
}

/// Liveness summary kept for existing dashboard clients
async fn system_status() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "uptime": "ok" }))
}

/// Usage, cost and detector statistics
async fn summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DashboardSummary>, ApiError> {
    let cost_per_kwh = query.cost_per_kwh.unwrap_or(state.cost_per_kwh);
    if !cost_per_kwh.is_finite() || cost_per_kwh < 0.0 {
        return Err(ApiError::BadRequest(format!(
            "cost_per_kwh must be a non-negative number, got {}",
            cost_per_kwh
        )));
    }

    Ok(Json(state.session.lock().await.summary(cost_per_kwh)))
}

/// Recent spike alerts, newest first
async fn alerts(State(state): State<Arc<AppState>>) -> Json<Vec<SpikeAlert>> {
    Json(state.session.lock().await.recent_alerts())
}

/// Session history as CSV
async fn export_csv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let csv = state
        .session
        .lock()
        .await
        .export_csv()
        .map_err(ApiError::Export)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        csv,
    )
        .into_response())
}

/// Start a fresh session
async fn reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let discarded = {
        let mut session = state.session.lock().await;
        let discarded = session.aggregator().samples_ingested();
        session.reset();
        discarded
    };

    state.metrics.reset_session();
    state.logger.log_session_reset(discarded);

    Json(serde_json::json!({ "status": "reset", "samples_discarded": discarded }))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let progress = {
        let session = state.session.lock().await;
        let aggregator = session.aggregator();
        DetectorProgress {
            state: aggregator.state(),
            samples: aggregator.window_len(),
            window_size: aggregator.config().window_size,
        }
    };
    let readiness = state
        .health_registry
        .readiness()
        .await
        .with_detector(progress);

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return ApiError::Internal("failed to encode metrics".to_string()).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/data", post(receive_data))
        .route("/api/status", get(system_status))
        .route("/api/summary", get(summary))
        .route("/api/alerts", get(alerts))
        .route("/api/export.csv", get(export_csv))
        .route("/api/reset", post(reset))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
