//! Storage module for persisting crawl progress
//!
//! This module handles checkpoint persistence:
//! - Loading the last saved crawl state at startup
//! - Atomically replacing the checkpoint during and after the crawl

mod checkpoint;
mod traits;

pub use checkpoint::{CheckpointRecord, JsonCheckpointStore};
pub use traits::{CheckpointStore, StorageError, StorageResult};
