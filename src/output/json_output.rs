//! JSON export of the scraped items

use crate::output::traits::{OutputResult, Sink};
use crate::output::StatsSnapshot;
use crate::state::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Serialize)]
struct JsonExport<'a> {
    exported_at: DateTime<Utc>,
    stats: &'a StatsSnapshot,
    items: &'a [Record],
}

/// Writes `{ exported_at, stats, items }` as pretty-printed JSON
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for JsonSink {
    fn name(&self) -> &str {
        "json"
    }

    fn write(&self, items: &[Record], stats: &StatsSnapshot) -> OutputResult<()> {
        let export = JsonExport {
            exported_at: Utc::now(),
            stats,
            items,
        };

        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &export)?;
        writer.flush()?;
        Ok(())
    }
}
