//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use meter_agent::api::{create_router, AppState};
use meter_agent_lib::{
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    MeterSession,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SOURCE).await;
    health_registry.register(components::API).await;

    let state = Arc::new(AppState::new(
        health_registry,
        AgentMetrics::new(),
        StructuredLogger::new("test-node"),
        MeterSession::default().shared(),
        0.15,
    ));
    let router = create_router(state.clone());

    (router, state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_reading(power: f64) -> Request<Body> {
    let payload = serde_json::json!({
        "device_id": "ESP32_01",
        "voltage": 220.0,
        "current": power / 220.0,
        "power": power,
    });

    Request::builder()
        .method("POST")
        .uri("/api/data")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_receive_data_annotates_reading() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(post_reading(120.0)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["processed_data"]["device_id"], "ESP32_01");
    assert_eq!(json["processed_data"]["power"], 120.0);
    assert_eq!(json["processed_data"]["is_anomaly"], false);
}

#[tokio::test]
async fn test_receive_data_rejects_negative_power() {
    let (app, state) = setup_test_app().await;

    let response = app.oneshot(post_reading(-5.0)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["status"], "error");

    // Rejected readings leave no trace in the session
    let session = state.session.lock().await;
    assert_eq!(session.aggregator().samples_ingested(), 0);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_receive_data_flags_spike_and_raises_alert() {
    let (app, _state) = setup_test_app().await;

    for _ in 0..19 {
        let response = app.clone().oneshot(post_reading(100.0)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(post_reading(1000.0)).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["processed_data"]["is_anomaly"], true);

    let response = app.oneshot(get("/api/alerts")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let alerts = body_json(response).await;
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["message"], "Power spike detected: 1000.00 W");
    assert_eq!(alerts[0]["severity"], "critical");
}

#[tokio::test]
async fn test_status_endpoint() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["uptime"], "ok");
}

#[tokio::test]
async fn test_summary_reflects_ingested_readings() {
    let (app, _state) = setup_test_app().await;

    for power in [100.0, 200.0, 300.0] {
        app.clone().oneshot(post_reading(power)).await.unwrap();
    }

    let response = app.oneshot(get("/api/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["current_power_watts"], 300.0);
    assert_eq!(json["samples_ingested"], 3);
    assert_eq!(json["detector_state"], "warming");
    assert_eq!(json["window_len"], 3);
    assert_eq!(json["window_size"], 20);
    assert_eq!(json["cost_per_kwh"], 0.15);

    // 600 W over three 2 s samples
    let kwh = json["cumulative_energy_kwh"].as_f64().unwrap();
    assert!((kwh - 600.0 * 2.0 / 3_600_000.0).abs() < 1e-12);
}

#[tokio::test]
async fn test_summary_uses_query_tariff() {
    let (app, _state) = setup_test_app().await;

    app.clone().oneshot(post_reading(1000.0)).await.unwrap();

    let response = app
        .oneshot(get("/api/summary?cost_per_kwh=0.30"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["cost_per_kwh"], 0.30);

    let kwh = json["cumulative_energy_kwh"].as_f64().unwrap();
    let cost = json["estimated_monthly_cost"].as_f64().unwrap();
    assert!((cost - kwh * 30.0 * 0.30).abs() < 1e-12);
}

#[tokio::test]
async fn test_summary_rejects_negative_tariff() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(get("/api/summary?cost_per_kwh=-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_returns_404_without_data() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/api/export.csv")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "No data to export");
}

#[tokio::test]
async fn test_export_returns_csv() {
    let (app, _state) = setup_test_app().await;

    app.clone().oneshot(post_reading(110.0)).await.unwrap();
    app.clone().oneshot(post_reading(330.0)).await.unwrap();

    let response = app.oneshot(get("/api/export.csv")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("energy_data.csv"));

    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.split('\n').collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Time,Device_ID,Voltage,Current,Power,Is_Anomaly");
    assert!(lines[1].ends_with(",ESP32_01,220,0.5,110,false"));
    assert!(lines[2].ends_with(",ESP32_01,220,1.5,330,false"));
}

#[tokio::test]
async fn test_reset_clears_session() {
    let (app, state) = setup_test_app().await;

    for _ in 0..4 {
        app.clone().oneshot(post_reading(150.0)).await.unwrap();
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/reset")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "reset");
    assert_eq!(json["samples_discarded"], 4);

    {
        let session = state.session.lock().await;
        assert_eq!(session.aggregator().samples_ingested(), 0);
        assert_eq!(session.aggregator().cumulative_energy_kwh(), 0.0);
    }

    let response = app.oneshot(get("/api/export.csv")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::SOURCE, "read failed: timeout")
        .await;

    let response = app.oneshot(get("/healthz")).await.unwrap();

    // Degraded still returns 200 (operational)
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::SOURCE, "collection loop stopped: task panicked")
        .await;

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let health = body_json(response).await;
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app().await;

    // By default, agent is not ready
    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let readiness = body_json(response).await;
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_reports_detector_progress() {
    let (app, state) = setup_test_app().await;
    state.health_registry.set_ready(true).await;

    for _ in 0..5 {
        app.clone().oneshot(post_reading(100.0)).await.unwrap();
    }

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let readiness = body_json(response).await;
    assert_eq!(readiness["ready"], true);
    assert_eq!(readiness["detector"]["state"], "warming");
    assert_eq!(readiness["detector"]["samples"], 5);
    assert_eq!(readiness["detector"]["window_size"], 20);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state) = setup_test_app().await;

    app.clone().oneshot(post_reading(100.0)).await.unwrap();

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert!(text.contains("meter_agent_readings_ingested_total"));
}

#[tokio::test]
async fn test_cors_preflight_allows_browser_dashboards() {
    let (app, _state) = setup_test_app().await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/data")
        .header(header::ORIGIN, "http://dashboard.local")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_cors_headers_on_simple_request() {
    let (app, _state) = setup_test_app().await;

    let request = Request::builder()
        .uri("/api/summary")
        .header(header::ORIGIN, "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_detector_activates_after_window_fills() {
    let (app, _state) = setup_test_app().await;

    for _ in 0..19 {
        app.clone().oneshot(post_reading(100.0)).await.unwrap();
    }
    let response = app.clone().oneshot(get("/api/summary")).await.unwrap();
    assert_eq!(body_json(response).await["detector_state"], "warming");

    app.clone().oneshot(post_reading(100.0)).await.unwrap();
    let response = app.oneshot(get("/api/summary")).await.unwrap();
    assert_eq!(body_json(response).await["detector_state"], "active");
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/api/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
