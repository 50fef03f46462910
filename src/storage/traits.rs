//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::CrawlState;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to replace checkpoint {path}: {source}")]
    Persist {
        path: String,
        source: std::io::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backends
///
/// A backend persists whole-state snapshots. It never mutates crawl state:
/// `save` receives a borrowed snapshot and `load` hands back a fresh value.
pub trait CheckpointStore: Send {
    /// Loads the last saved state
    ///
    /// A missing or unreadable checkpoint yields `CrawlState::default()`;
    /// loading never fails.
    fn load(&self) -> CrawlState;

    /// Replaces the checkpoint with `state` in one atomic step
    fn save(&self, state: &CrawlState) -> StorageResult<()>;

    /// Where the checkpoint lives
    fn path(&self) -> &Path;
}
