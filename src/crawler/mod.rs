//! Crawler module for paginated fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - Adaptive rate control and block detection
//! - HTTP fetching with bounded retries
//! - HTML item extraction
//! - Overall crawl orchestration

pub mod block;
mod fetcher;
mod orchestrator;
mod parser;
pub mod rate;

pub use block::{BlockDetector, Classification};
pub use fetcher::{build_http_client, FetchedPage, RequestOutcome, RetryExecutor, RetryPolicy};
pub use orchestrator::{AbortReason, CrawlOrchestrator, CrawlOutcome, CrawlReport, StopReason};
pub use parser::{HtmlParser, ParseError, ParsedPage, Parser};
pub use rate::RateController;

use crate::config::Config;
use crate::TidemarkError;
use std::path::Path;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the checkpoint (unless `fresh`)
/// 2. Build the HTTP client and the item parser
/// 3. Fetch and extract pages until pagination ends or fails
/// 4. Save the final checkpoint and run the configured sinks
///
/// The checkpoint is not tagged with a configuration hash; see [`crawl_file`].
pub async fn crawl(config: Config, fresh: bool) -> Result<CrawlReport, TidemarkError> {
    CrawlOrchestrator::new(config, fresh)?.run().await
}

/// Loads the configuration file at `path` and runs a crawl with it
///
/// Checkpoints record the hash of the file, so resuming after the
/// configuration changed logs a warning.
pub async fn crawl_file(path: &Path, fresh: bool) -> Result<CrawlReport, TidemarkError> {
    CrawlOrchestrator::from_config_file(path, fresh)?.run().await
}
