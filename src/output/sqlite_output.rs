//! SQLite export of the scraped items
//!
//! The database holds the item set of the latest export plus one row per
//! export run. Each export replaces the items inside a single transaction.

use crate::output::traits::{OutputResult, Sink};
use crate::output::StatsSnapshot;
use crate::state::Record;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::PathBuf;

/// SQL schema for the export database
pub const SCHEMA_SQL: &str = r#"
-- One row per export
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exported_at TEXT NOT NULL,
    started_at TEXT NOT NULL,
    total_requests INTEGER NOT NULL,
    successful_requests INTEGER NOT NULL,
    failed_requests INTEGER NOT NULL,
    retries INTEGER NOT NULL,
    blocked_detections INTEGER NOT NULL,
    items_scraped INTEGER NOT NULL,
    final_delay REAL NOT NULL
);

-- Items of the latest export, in discovery order
CREATE TABLE IF NOT EXISTS items (
    key TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    fields TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_position ON items(position);
"#;

/// SQLite-based sink
#[derive(Debug, Clone)]
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> OutputResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(conn)
    }
}

impl Sink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn write(&self, items: &[Record], stats: &StatsSnapshot) -> OutputResult<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM items", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO items (key, position, fields) VALUES (?1, ?2, ?3)")?;
            for (position, record) in items.iter().enumerate() {
                let fields = serde_json::to_string(&record.fields)?;
                stmt.execute(params![record.key, position as i64, fields])?;
            }
        }

        tx.execute(
            "INSERT INTO runs (exported_at, started_at, total_requests, successful_requests,
                failed_requests, retries, blocked_detections, items_scraped, final_delay)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                Utc::now().to_rfc3339(),
                stats.start_time.to_rfc3339(),
                stats.total_requests as i64,
                stats.successful_requests as i64,
                stats.failed_requests as i64,
                stats.retries as i64,
                stats.blocked_detections as i64,
                stats.items_scraped as i64,
                stats.current_delay,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}
