//! Energy usage accumulation and billing estimates
//!
//! Energy is integrated with the left-rectangle rule: each sample's power is
//! assumed constant for one sample interval.

use std::time::Duration;

use crate::models::UsageSnapshot;

/// Default interval between samples
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// Days per month used for the monthly cost estimate
pub const BILLING_DAYS_PER_MONTH: f64 = 30.0;

const SECONDS_PER_HOUR: f64 = 3600.0;
const WATTS_PER_KILOWATT: f64 = 1000.0;

/// Running energy total
#[derive(Debug, Clone, PartialEq)]
pub struct UsageAccumulator {
    cumulative_energy_kwh: f64,
    sample_interval_secs: f64,
    samples: u64,
}

impl UsageAccumulator {
    pub fn new(sample_interval: Duration) -> Self {
        Self {
            cumulative_energy_kwh: 0.0,
            sample_interval_secs: sample_interval.as_secs_f64(),
            samples: 0,
        }
    }

    /// Energy in kWh contributed by one sample of `power_watts`
    pub fn energy_for(&self, power_watts: f64) -> f64 {
        (power_watts / WATTS_PER_KILOWATT) * (self.sample_interval_secs / SECONDS_PER_HOUR)
    }

    /// Add one sample, returning the new cumulative total
    pub fn add_sample(&mut self, power_watts: f64) -> f64 {
        self.cumulative_energy_kwh += self.energy_for(power_watts);
        self.samples += 1;
        self.cumulative_energy_kwh
    }

    pub fn cumulative_energy_kwh(&self) -> f64 {
        self.cumulative_energy_kwh
    }

    pub fn sample_interval_secs(&self) -> f64 {
        self.sample_interval_secs
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// `cumulative_energy_kwh * 30 * cost_per_kwh`
    pub fn estimated_monthly_cost(&self, cost_per_kwh: f64) -> f64 {
        self.cumulative_energy_kwh * BILLING_DAYS_PER_MONTH * cost_per_kwh
    }

    pub fn reset(&mut self) {
        self.cumulative_energy_kwh = 0.0;
        self.samples = 0;
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            cumulative_energy_kwh: self.cumulative_energy_kwh,
            sample_interval_secs: self.sample_interval_secs,
            samples: self.samples,
        }
    }
}

impl Default for UsageAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}
