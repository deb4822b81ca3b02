//! Offline simulation: runs the simulated meter through the same pipeline
//! the agent uses, without a network round trip.

use anyhow::{anyhow, ensure, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use colored::Colorize;
use std::path::Path;
use std::time::Duration;

use meter_agent_lib::{
    anomaly::AlertFeed,
    collector::{SimulatedMeter, SimulatorConfig},
    export::ReadingHistory,
    AggregatorConfig, MeterSession,
};

use crate::commands::export::write_csv;
use crate::commands::usage::{print_alerts, print_summary};
use crate::output::{print_success, print_warning, OutputFormat};

/// Timestamps are stepped in whole milliseconds
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Options for an offline run
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub count: usize,
    pub seed: Option<u64>,
    pub interval_secs: f64,
    pub cost_per_kwh: f64,
    pub output: Option<String>,
}

/// Feed `count` simulated readings through a fresh session
///
/// Timestamps advance by one interval per reading from the current time,
/// so exports look like a real session of the same length.
pub fn run_simulation(options: &SimulationOptions) -> Result<MeterSession> {
    ensure!(
        options.interval_secs.is_finite() && options.interval_secs > 0.0,
        "interval must be positive, got {}",
        options.interval_secs
    );

    let interval = Duration::try_from_secs_f64(options.interval_secs)
        .map_err(|e| anyhow!("interval {} s is out of range: {}", options.interval_secs, e))?;
    ensure!(
        interval >= MIN_INTERVAL,
        "interval must be at least {} ms, got {} s",
        MIN_INTERVAL.as_millis(),
        options.interval_secs
    );
    let step = i64::try_from(interval.as_millis())
        .ok()
        .and_then(ChronoDuration::try_milliseconds)
        .ok_or_else(|| anyhow!("interval {} s is out of range", options.interval_secs))?;

    let meter = match options.seed {
        Some(seed) => SimulatedMeter::with_seed(SimulatorConfig::default(), seed),
        None => SimulatedMeter::new(SimulatorConfig::default()),
    };

    let config = AggregatorConfig {
        sample_interval: interval,
        ..AggregatorConfig::default()
    };
    let mut session = MeterSession::new(config, AlertFeed::default(), ReadingHistory::default());

    let start = Utc::now();

    for i in 0..options.count {
        let timestamp = i32::try_from(i)
            .ok()
            .and_then(|n| step.checked_mul(n))
            .and_then(|offset| start.checked_add_signed(offset))
            .ok_or_else(|| anyhow!("timestamp of reading {} is out of range", i))?;

        let mut reading = meter.sample();
        reading.timestamp = timestamp;
        session
            .record(reading)
            .with_context(|| format!("simulated reading {} was rejected", i))?;
    }

    Ok(session)
}

/// Run an offline simulation and print the result
pub fn simulate(options: SimulationOptions, format: OutputFormat) -> Result<()> {
    let session = run_simulation(&options)?;
    let summary = session.summary(options.cost_per_kwh);

    print_summary(&summary, format)?;

    if let OutputFormat::Table = format {
        println!();
        println!("{}", "Recent Alerts".bold());
        println!("{}", "-".repeat(50));
    }
    print_alerts(&session.recent_alerts(), format);

    if let Some(path) = &options.output {
        match session.export_csv() {
            Ok(csv) => {
                let rows = write_csv(Path::new(path), &csv)?;
                print_success(&format!("Exported {} readings to {}", rows, path));
            }
            Err(e) => print_warning(&format!("Nothing exported: {}", e)),
        }
    }

    Ok(())
}
