//! Session history and CSV export
//!
//! The export layout is consumed by existing tooling and must stay
//! byte-compatible: a fixed header, `\n` between rows and no trailing
//! newline.

use std::collections::VecDeque;

use crate::error::ExportError;
use crate::models::AnnotatedReading;

/// Header row of the CSV export
pub const CSV_HEADER: [&str; 6] = ["Time", "Device_ID", "Voltage", "Current", "Power", "Is_Anomaly"];

/// Default maximum number of readings kept per session
const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Every annotated reading of the current session, oldest first
#[derive(Debug, Clone)]
pub struct ReadingHistory {
    entries: VecDeque<AnnotatedReading>,
    max_entries: usize,
}

impl ReadingHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.min(10_000)),
            max_entries: max_entries.max(1),
        }
    }

    /// Append a reading, evicting the oldest beyond the limit
    pub fn push(&mut self, reading: AnnotatedReading) {
        self.entries.push_back(reading);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotatedReading> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Export the whole history as CSV
    pub fn to_csv(&self) -> Result<String, ExportError> {
        to_csv(self.entries.iter())
    }
}

impl Default for ReadingHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

/// Render readings in the dashboard export format
///
/// Returns [`ExportError::Empty`] when there is nothing to export.
pub fn to_csv<'a, I>(readings: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = &'a AnnotatedReading>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;

    let mut rows = 0usize;
    for annotated in readings {
        let reading = &annotated.reading;
        writer.write_record([
            reading.time_label(),
            reading.device_id.clone(),
            format_number(reading.voltage),
            format_number(reading.current),
            format_number(reading.power),
            annotated.is_anomaly.to_string(),
        ])?;
        rows += 1;
    }

    if rows == 0 {
        return Err(ExportError::Empty);
    }

    let mut bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Writer(e.to_string()))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }

    String::from_utf8(bytes).map_err(|e| ExportError::Writer(e.to_string()))
}

/// Render a number the way the dashboard's JavaScript does
///
/// Shortest round-trip digits, positional inside `[1e-6, 1e21)` and
/// exponent form (`1e-7`, `1.5e+21`) outside it.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return value.to_string();
    }

    let scientific = format!("{:e}", value);
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => scientific,
    }
}
