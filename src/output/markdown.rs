//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a crawl:
//! request statistics followed by the table of scraped items.

use crate::output::traits::{OutputResult, Sink};
use crate::output::StatsSnapshot;
use crate::state::Record;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Writes the markdown summary to a file
#[derive(Debug, Clone)]
pub struct MarkdownSink {
    path: PathBuf,
}

impl MarkdownSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for MarkdownSink {
    fn name(&self) -> &str {
        "markdown"
    }

    fn write(&self, items: &[Record], stats: &StatsSnapshot) -> OutputResult<()> {
        let markdown = format_markdown_summary(items, stats);
        let mut file = File::create(&self.path)?;
        file.write_all(markdown.as_bytes())?;
        Ok(())
    }
}

/// Formats a crawl summary as markdown
///
/// # Arguments
///
/// * `items` - The scraped records
/// * `stats` - Final crawl statistics
///
/// # Returns
///
/// A formatted markdown string
pub fn format_markdown_summary(items: &[Record], stats: &StatsSnapshot) -> String {
    let mut md = String::new();

    md.push_str("# Tidemark Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", stats.start_time.to_rfc3339()));
    md.push_str(&format!(
        "- **Elapsed**: {:.2} seconds ({:.2} minutes)\n",
        stats.elapsed_seconds,
        stats.elapsed_seconds / 60.0
    ));
    md.push_str(&format!("- **Items Scraped**: {}\n", stats.items_scraped));
    md.push_str(&format!("- **Items Exported**: {}\n\n", items.len()));

    md.push_str("## Request Statistics\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Total Requests | {} |\n", stats.total_requests));
    md.push_str(&format!("| Successful | {} |\n", stats.successful_requests));
    md.push_str(&format!("| Failed | {} |\n", stats.failed_requests));
    md.push_str(&format!("| Retries | {} |\n", stats.retries));
    md.push_str(&format!(
        "| Blocks Detected | {} |\n",
        stats.blocked_detections
    ));
    md.push_str(&format!("| Parse Errors | {} |\n", stats.parse_errors));
    md.push_str(&format!(
        "| Success Rate | {:.2}% |\n",
        stats.success_rate * 100.0
    ));
    md.push_str(&format!(
        "| Throughput | {:.2} items/s |\n",
        stats.throughput
    ));
    md.push_str(&format!(
        "| Final Delay | {:.2}s |\n\n",
        stats.current_delay
    ));

    if items.is_empty() {
        md.push_str("_No items scraped._\n");
        return md;
    }

    // Union of field names so sparse records still line up
    let columns: BTreeSet<&str> = items
        .iter()
        .flat_map(|record| record.fields.keys().map(String::as_str))
        .collect();

    md.push_str("## Items\n\n");
    md.push_str("| Key |");
    for column in &columns {
        md.push_str(&format!(" {} |", escape_cell(column)));
    }
    md.push('\n');
    md.push_str("|-----|");
    for _ in &columns {
        md.push_str("-----|");
    }
    md.push('\n');

    for record in items {
        md.push_str(&format!("| {} |", escape_cell(&record.key)));
        for column in &columns {
            let value = record.fields.get(*column).map(String::as_str).unwrap_or("");
            md.push_str(&format!(" {} |", escape_cell(value)));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}
