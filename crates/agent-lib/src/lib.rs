//! Agent library for streaming power meter analysis
//!
//! This crate provides the core functionality for:
//! - Rolling-window power spike detection
//! - Energy usage accumulation and cost estimates
//! - Reading collection from simulated or real meters
//! - CSV export of session history
//! - Health checks and observability

pub mod aggregator;
pub mod anomaly;
pub mod collector;
pub mod error;
pub mod export;
pub mod health;
pub mod models;
pub mod observability;
pub mod session;
pub mod usage;

pub use aggregator::{AggregatorConfig, StreamingAnomalyAggregator};
pub use error::{ExportError, InvalidReadingError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use session::{MeterSession, SessionUpdate, SharedSession};
