//! JSON checkpoint file
//!
//! The checkpoint is a single JSON document. Every save writes a temporary
//! file in the checkpoint's directory, fsyncs it, then renames it over the
//! previous checkpoint, so a reader sees either the old or the new document.

use crate::output::StatsSnapshot;
use crate::state::{CrawlState, Record};
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// On-disk form of a crawl state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub items: Vec<Record>,
    pub stats: StatsSnapshot,
    pub current_delay: f64,
    #[serde(default)]
    pub frontier: Option<String>,
    #[serde(default)]
    pub config_hash: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn from_state(state: &CrawlState, config_hash: Option<&str>) -> Self {
        Self {
            items: state.items().to_vec(),
            stats: state.stats.clone(),
            current_delay: state.current_delay,
            frontier: state.frontier.clone(),
            config_hash: config_hash.map(str::to_string),
            saved_at: Utc::now(),
        }
    }

    pub fn into_state(self) -> CrawlState {
        CrawlState::from_parts(self.items, self.stats, self.current_delay, self.frontier)
    }
}

/// Checkpoint backend writing one JSON file
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
    config_hash: Option<String>,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config_hash: None,
        }
    }

    /// Tags every saved checkpoint with the hash of the active configuration
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Reads the raw checkpoint record
    ///
    /// Returns `Ok(None)` when no checkpoint file exists.
    pub fn read_record(&self) -> StorageResult<Option<CheckpointRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write_atomically(&self, bytes: &[u8]) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;

        temp.persist(&self.path).map_err(|e| StorageError::Persist {
            path: self.path.display().to_string(),
            source: e.error,
        })?;

        // Make the rename durable; not every platform can open a directory
        #[cfg(unix)]
        if let Ok(dir) = std::fs::File::open(&dir) {
            let _ = dir.sync_all();
        }

        Ok(())
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self) -> CrawlState {
        match self.read_record() {
            Ok(Some(record)) => {
                if let (Some(saved), Some(current)) = (&record.config_hash, &self.config_hash) {
                    if saved != current {
                        tracing::warn!(
                            "Checkpoint {} was written under a different configuration",
                            self.path.display()
                        );
                    }
                }
                tracing::info!(
                    "Checkpoint loaded: {} items already scraped (saved {})",
                    record.items.len(),
                    record.saved_at.to_rfc3339()
                );
                record.into_state()
            }
            Ok(None) => {
                tracing::info!("No checkpoint at {}, starting fresh", self.path.display());
                CrawlState::default()
            }
            Err(e) => {
                tracing::error!(
                    "Failed to load checkpoint {}: {}; starting fresh",
                    self.path.display(),
                    e
                );
                CrawlState::default()
            }
        }
    }

    fn save(&self, state: &CrawlState) -> StorageResult<()> {
        let record = CheckpointRecord::from_state(state, self.config_hash.as_deref());
        let bytes = serde_json::to_vec_pretty(&record)?;
        self.write_atomically(&bytes)?;
        tracing::debug!(
            "Checkpoint saved: {} items to {}",
            state.len(),
            self.path.display()
        );
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
