//! Sink traits and error types
//!
//! A sink turns the final items and stats of a run into some durable artifact.
//! The orchestrator invokes every configured sink exactly once per run.

use crate::output::StatsSnapshot;
use crate::state::Record;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for output sinks
pub trait Sink: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Writes the final items and stats of a run
    ///
    /// # Arguments
    ///
    /// * `items` - Records in discovery order
    /// * `stats` - Final counters of the run
    fn write(&self, items: &[Record], stats: &StatsSnapshot) -> OutputResult<()>;
}
