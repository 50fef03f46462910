//! Crawl statistics collection and reporting
//!
//! This module provides the counters every component feeds while a crawl
//! runs, the serializable snapshot persisted in checkpoints, and the final
//! stats report printed at exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events that move the crawl counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsEvent {
    /// One HTTP attempt was issued
    RequestStarted,
    /// A logical fetch produced a response that was not blocked
    RequestSucceeded,
    /// A logical fetch ended without a usable response
    RequestFailed,
    /// A failed attempt is followed by another one
    RetryPerformed,
    /// A response was classified as an anti-scraping block
    BlockDetected,
    /// A new (not previously visited) item was stored
    ItemScraped,
    /// A page could not be parsed
    ParseFailed,
}

/// Point-in-time view of the crawl counters
///
/// Counters never decrease. `current_delay` follows the rate controller and
/// may move in either direction. The derived rates are computed when the
/// snapshot is taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retries: u64,
    pub blocked_detections: u64,
    pub items_scraped: u64,
    #[serde(default)]
    pub parse_errors: u64,

    /// When the crawl first started; preserved across resumes
    pub start_time: DateTime<Utc>,

    /// Inter-request delay in seconds at snapshot time
    pub current_delay: f64,

    #[serde(default)]
    pub elapsed_seconds: f64,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub throughput: f64,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        StatsCollector::new(1.0).snapshot()
    }
}

impl StatsSnapshot {
    /// Returns true when the counters (ignoring derived rates) are equal
    pub fn same_counters(&self, other: &StatsSnapshot) -> bool {
        self.total_requests == other.total_requests
            && self.successful_requests == other.successful_requests
            && self.failed_requests == other.failed_requests
            && self.retries == other.retries
            && self.blocked_detections == other.blocked_detections
            && self.items_scraped == other.items_scraped
            && self.parse_errors == other.parse_errors
    }
}

/// Aggregates crawl counters
///
/// Only `record` and `set_delay` mutate the collector; everything else reads
/// through `snapshot`.
#[derive(Debug, Clone)]
pub struct StatsCollector {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    retries: u64,
    blocked_detections: u64,
    items_scraped: u64,
    parse_errors: u64,
    start_time: DateTime<Utc>,
    current_delay: f64,
}

impl StatsCollector {
    /// Starts a fresh collector at the current time
    pub fn new(initial_delay: f64) -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            retries: 0,
            blocked_detections: 0,
            items_scraped: 0,
            parse_errors: 0,
            start_time: Utc::now(),
            current_delay: initial_delay,
        }
    }

    /// Continues counting from a persisted snapshot
    pub fn resume(snapshot: &StatsSnapshot) -> Self {
        Self {
            total_requests: snapshot.total_requests,
            successful_requests: snapshot.successful_requests,
            failed_requests: snapshot.failed_requests,
            retries: snapshot.retries,
            blocked_detections: snapshot.blocked_detections,
            items_scraped: snapshot.items_scraped,
            parse_errors: snapshot.parse_errors,
            start_time: snapshot.start_time,
            current_delay: snapshot.current_delay,
        }
    }

    pub fn record(&mut self, event: StatsEvent) {
        let counter = match event {
            StatsEvent::RequestStarted => &mut self.total_requests,
            StatsEvent::RequestSucceeded => &mut self.successful_requests,
            StatsEvent::RequestFailed => &mut self.failed_requests,
            StatsEvent::RetryPerformed => &mut self.retries,
            StatsEvent::BlockDetected => &mut self.blocked_detections,
            StatsEvent::ItemScraped => &mut self.items_scraped,
            StatsEvent::ParseFailed => &mut self.parse_errors,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn set_delay(&mut self, delay: f64) {
        self.current_delay = delay;
    }

    pub fn items_scraped(&self) -> u64 {
        self.items_scraped
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed_seconds = (Utc::now() - self.start_time)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;

        let success_rate = if self.total_requests > 0 {
            self.successful_requests as f64 / self.total_requests as f64
        } else {
            0.0
        };

        let throughput = if elapsed_seconds > 0.0 {
            self.items_scraped as f64 / elapsed_seconds
        } else {
            0.0
        };

        StatsSnapshot {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            retries: self.retries,
            blocked_detections: self.blocked_detections,
            items_scraped: self.items_scraped,
            parse_errors: self.parse_errors,
            start_time: self.start_time,
            current_delay: self.current_delay,
            elapsed_seconds,
            success_rate,
            throughput,
        }
    }
}

/// Prints the stats report to stdout
pub fn print_statistics(stats: &StatsSnapshot) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Started: {}", stats.start_time.to_rfc3339());
    println!("  Elapsed: {:.2}s", stats.elapsed_seconds);
    println!("  Items scraped: {}", stats.items_scraped);
    println!();

    println!("Requests:");
    println!("  Total: {}", stats.total_requests);
    println!("  Successful: {}", stats.successful_requests);
    println!("  Failed: {}", stats.failed_requests);
    println!("  Retries: {}", stats.retries);
    println!("  Blocks detected: {}", stats.blocked_detections);
    if stats.parse_errors > 0 {
        println!("  Parse errors: {}", stats.parse_errors);
    }
    println!();

    println!("Success Rate: {:.1}%", stats.success_rate * 100.0);
    println!("Current Delay: {:.2}s", stats.current_delay);
    if stats.items_scraped > 0 {
        println!("Throughput: {:.2} items/s", stats.throughput);
    }
}
