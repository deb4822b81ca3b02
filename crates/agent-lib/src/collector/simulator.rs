//! Simulated power meter
//!
//! Produces a base load around 100 W with uniform noise and occasional
//! spikes, standing in for a real device when none is attached.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ReadingSource;
use crate::models::Reading;

/// Configuration for the simulated meter
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub device_id: String,
    /// Supply voltage in volts (default: 220)
    pub voltage: f64,
    /// Base load in watts (default: 100)
    pub base_load_watts: f64,
    /// Half-width of the uniform noise band in watts (default: 10)
    pub noise_watts: f64,
    /// Probability of a spike per sample (default: 0.05)
    pub spike_probability: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            device_id: "ESP32_01".to_string(),
            voltage: 220.0,
            base_load_watts: 100.0,
            noise_watts: 10.0,
            spike_probability: 0.05,
        }
    }
}

/// Pseudo-random reading generator
pub struct SimulatedMeter {
    config: SimulatorConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedMeter {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for tests and reproducible runs
    pub fn with_seed(config: SimulatorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Draw the next power value in watts
    pub fn sample_power(&self) -> f64 {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let noise = if self.config.noise_watts > 0.0 {
            rng.gen_range(-self.config.noise_watts..self.config.noise_watts)
        } else {
            0.0
        };
        let mut power = (self.config.base_load_watts + noise).max(0.0);

        if rng.gen_bool(self.config.spike_probability.clamp(0.0, 1.0)) {
            power *= 2.0 + rng.gen::<f64>();
        }

        power
    }

    /// Build the next full reading
    pub fn sample(&self) -> Reading {
        let power = self.sample_power();
        let voltage = self.config.voltage;
        let current = if voltage > 0.0 { power / voltage } else { 0.0 };

        Reading::now(self.config.device_id.clone(), voltage, current, power)
    }
}

impl Default for SimulatedMeter {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

#[async_trait]
impl ReadingSource for SimulatedMeter {
    async fn next_reading(&self) -> Result<Reading> {
        Ok(self.sample())
    }

    fn name(&self) -> &str {
        "simulator"
    }
}
