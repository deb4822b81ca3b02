//! Error types for reading ingestion and export

use thiserror::Error;

/// Raised when a reading cannot be ingested.
///
/// Rejection is atomic: the aggregator state is untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum InvalidReadingError {
    #[error("power must not be negative, got {0} W")]
    Negative(f64),

    #[error("power is not a number")]
    NotANumber,

    #[error("power must be finite, got {0} W")]
    Infinite(f64),
}

impl InvalidReadingError {
    /// Validate a power value, returning it unchanged when usable
    pub fn check_power(power: f64) -> Result<f64, Self> {
        if power.is_nan() {
            Err(Self::NotANumber)
        } else if power.is_infinite() {
            Err(Self::Infinite(power))
        } else if power < 0.0 {
            Err(Self::Negative(power))
        } else {
            Ok(power)
        }
    }

    /// Short machine-friendly reason, used as a log/metric label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Negative(_) => "negative",
            Self::NotANumber => "nan",
            Self::Infinite(_) => "infinite",
        }
    }
}

/// Errors produced while exporting reading history
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no readings to export")]
    Empty,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV writer error: {0}")]
    Writer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
