//! Reading collection from power meters
//!
//! This module provides the sources that produce readings and the loop
//! that pulls from a source at a fixed cadence and feeds the session.

mod r#loop;
mod simulator;

pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder};
pub use simulator::{SimulatedMeter, SimulatorConfig};

use crate::models::Reading;
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for reading source implementations
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Produce the next reading
    async fn next_reading(&self) -> Result<Reading>;

    /// Short name used in logs
    fn name(&self) -> &str;
}
