//! Output module: statistics, observers and sinks
//!
//! This module handles:
//! - Collecting crawl counters and printing the final stats report
//! - Reporting crawl events through an injected observer
//! - Exporting the scraped items (JSON, markdown, SQLite)

mod json_output;
mod markdown;
mod observer;
mod sqlite_output;
pub mod stats;
mod traits;

pub use json_output::JsonSink;
pub use markdown::{format_markdown_summary, MarkdownSink};
pub use observer::{CrawlObserver, TracingObserver};
pub use sqlite_output::SqliteSink;
pub use stats::{print_statistics, StatsCollector, StatsEvent, StatsSnapshot};
pub use traits::{OutputError, OutputResult, Sink};

use crate::config::OutputConfig;

/// Builds the sinks enabled in the output configuration
pub fn sinks_from_config(config: &OutputConfig) -> Vec<Box<dyn Sink>> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

    if let Some(path) = &config.json_path {
        sinks.push(Box::new(JsonSink::new(path)));
    }
    if let Some(path) = &config.summary_path {
        sinks.push(Box::new(MarkdownSink::new(path)));
    }
    if let Some(path) = &config.database_path {
        sinks.push(Box::new(SqliteSink::new(path)));
    }

    sinks
}
