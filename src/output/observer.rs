//! Crawl observers
//!
//! The orchestrator reports everything noteworthy through a [`CrawlObserver`]
//! handed to it at construction. [`TracingObserver`] forwards the events to
//! `tracing`; tests substitute their own observer to capture them.

use crate::crawler::{CrawlOutcome, CrawlReport, ParseError, RequestOutcome};
use crate::output::{OutputError, StatsSnapshot};
use crate::state::{CrawlPhase, Record};
use crate::storage::StorageError;

/// Receives crawl events; every method defaults to doing nothing
pub trait CrawlObserver: Send + Sync {
    /// Called once before the first fetch with the resume point
    fn on_start(&self, _url: &str, _resumed_items: usize) {}

    fn on_phase(&self, _from: CrawlPhase, _to: CrawlPhase) {}

    fn on_fetch_outcome(&self, _url: &str, _outcome: &RequestOutcome) {}

    fn on_item(&self, _record: &Record) {}

    fn on_duplicate(&self, _key: &str) {}

    fn on_parse_error(&self, _url: &str, _error: &ParseError) {}

    fn on_checkpoint_saved(&self, _items: usize) {}

    fn on_checkpoint_failed(&self, _error: &StorageError) {}

    fn on_sink_failed(&self, _sink: &str, _error: &OutputError) {}

    /// Called after every periodic checkpoint
    fn on_progress(&self, _stats: &StatsSnapshot) {}

    fn on_finished(&self, _report: &CrawlReport) {}
}

/// Observer that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn on_start(&self, url: &str, resumed_items: usize) {
        if resumed_items > 0 {
            tracing::info!("Resuming crawl at {} with {} items", url, resumed_items);
        } else {
            tracing::info!("Starting crawl at {}", url);
        }
    }

    fn on_phase(&self, from: CrawlPhase, to: CrawlPhase) {
        tracing::trace!("Phase {} -> {}", from, to);
    }

    fn on_fetch_outcome(&self, url: &str, outcome: &RequestOutcome) {
        match outcome {
            RequestOutcome::Success(page) if page.is_success() => {
                tracing::debug!("Fetched {} (HTTP {})", url, page.status)
            }
            RequestOutcome::Success(page) => {
                tracing::warn!("Fetched {} with HTTP {}", url, page.status)
            }
            RequestOutcome::Blocked(reason) => {
                tracing::warn!("Blocked on {}: {}", url, reason)
            }
            RequestOutcome::TransientFailure(cause) => {
                tracing::warn!("Request to {} failed: {}", url, cause)
            }
            RequestOutcome::ExhaustedRetries {
                attempts,
                last_error,
            } => tracing::error!(
                "Giving up on {} after {} attempts: {}",
                url,
                attempts,
                last_error
            ),
            RequestOutcome::Cancelled => tracing::info!("Fetch of {} cancelled", url),
        }
    }

    fn on_item(&self, record: &Record) {
        tracing::debug!("Item scraped: {}", record.key);
    }

    fn on_duplicate(&self, key: &str) {
        tracing::trace!("Item already scraped: {}", key);
    }

    fn on_parse_error(&self, url: &str, error: &ParseError) {
        tracing::error!("Failed to parse {}: {}", url, error);
    }

    fn on_checkpoint_saved(&self, items: usize) {
        tracing::debug!("Checkpoint saved ({} items)", items);
    }

    fn on_checkpoint_failed(&self, error: &StorageError) {
        tracing::error!("Failed to save checkpoint: {}", error);
    }

    fn on_sink_failed(&self, sink: &str, error: &OutputError) {
        tracing::error!("Sink '{}' failed: {}", sink, error);
    }

    fn on_progress(&self, stats: &StatsSnapshot) {
        tracing::info!(
            "Progress: {} items, {} requests ({:.1}% ok), {} retries, {} blocks, delay {:.2}s",
            stats.items_scraped,
            stats.total_requests,
            stats.success_rate * 100.0,
            stats.retries,
            stats.blocked_detections,
            stats.current_delay
        );
    }

    fn on_finished(&self, report: &CrawlReport) {
        match &report.outcome {
            CrawlOutcome::Completed(reason) => tracing::info!(
                "Crawl completed ({}): {} pages fetched, {} items total",
                reason,
                report.pages_fetched,
                report.items_total
            ),
            CrawlOutcome::Aborted(reason) => tracing::error!(
                "Crawl aborted ({}): {} pages fetched, {} items total",
                reason,
                report.pages_fetched,
                report.items_total
            ),
            CrawlOutcome::Interrupted => tracing::warn!(
                "Crawl interrupted: {} pages fetched, {} items saved; rerun to resume",
                report.pages_fetched,
                report.items_total
            ),
        }
    }
}
