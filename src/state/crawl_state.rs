//! Live crawl state owned by the orchestrator

use crate::output::StatsSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One extracted item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique item identifier (a canonical URL for HTML listings)
    pub key: String,

    /// Extracted field values by name
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Progress of a crawl: the items found so far and the counters
///
/// `items` never holds two records with the same key, and `visited_keys` is
/// always exactly the key set of `items`. Both are private so that
/// [`CrawlState::insert`] is the only way in.
#[derive(Debug, Clone, Default)]
pub struct CrawlState {
    items: Vec<Record>,
    visited_keys: HashSet<String>,

    /// Counters as of the last sync from the stats collector
    pub stats: StatsSnapshot,

    /// Adaptive inter-request delay in seconds
    pub current_delay: f64,

    /// Page being processed when the state was captured; `None` starts at the base URL
    pub frontier: Option<String>,
}

impl CrawlState {
    /// Rebuilds a state from persisted items, dropping any repeated keys
    pub fn from_parts(
        items: Vec<Record>,
        stats: StatsSnapshot,
        current_delay: f64,
        frontier: Option<String>,
    ) -> Self {
        let mut state = Self {
            items: Vec::with_capacity(items.len()),
            visited_keys: HashSet::with_capacity(items.len()),
            stats,
            current_delay,
            frontier,
        };
        for record in items {
            state.insert(record);
        }
        state
    }

    /// Appends `record` unless its key was already visited
    ///
    /// Returns true if the record was new.
    pub fn insert(&mut self, record: Record) -> bool {
        if self.visited_keys.contains(&record.key) {
            return false;
        }
        self.visited_keys.insert(record.key.clone());
        self.items.push(record);
        true
    }

    pub fn is_visited(&self, key: &str) -> bool {
        self.visited_keys.contains(key)
    }

    /// Items in discovery order
    pub fn items(&self) -> &[Record] {
        &self.items
    }

    pub fn visited_keys(&self) -> &HashSet<String> {
        &self.visited_keys
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True for a state that has never issued a request
    pub fn is_fresh(&self) -> bool {
        self.stats.total_requests == 0 && self.items.is_empty() && self.frontier.is_none()
    }
}
