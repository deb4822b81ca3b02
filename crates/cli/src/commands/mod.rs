//! Subcommand implementations

pub mod export;
pub mod simulate;
pub mod status;
pub mod usage;
