//! Crawl orchestrator - main pagination loop
//!
//! This module drives a crawl run from the first listing page to the last:
//! - Restoring progress from the checkpoint (or starting fresh)
//! - Fetching each page through the retry executor
//! - Merging extracted records into the state, skipping known keys
//! - Checkpointing every N new items and on every exit path
//! - Handing the final items to the configured sinks

use crate::config::{load_config_with_hash, Config, CrawlConfig};
use crate::crawler::fetcher::{RequestOutcome, RetryExecutor};
use crate::crawler::parser::{HtmlParser, Parser};
use crate::output::{
    sinks_from_config, CrawlObserver, Sink, StatsCollector, StatsEvent, StatsSnapshot,
    TracingObserver,
};
use crate::state::{CrawlPhase, CrawlState, Record};
use crate::storage::{CheckpointStore, JsonCheckpointStore};
use crate::url::canonicalize;
use crate::TidemarkError;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a crawl ended normally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A page yielded no records
    NoItems,
    /// The last page had no next-page link
    NoNextPage,
    /// A page could not be parsed
    ParseFailure(String),
    /// The next-page link pointed at a page already fetched in this run
    PaginationCycle(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::NoItems => write!(f, "no items on page"),
            StopReason::NoNextPage => write!(f, "no next page"),
            StopReason::ParseFailure(e) => write!(f, "parse failure: {}", e),
            StopReason::PaginationCycle(url) => write!(f, "pagination cycle at {}", url),
        }
    }
}

/// Why a crawl was cut short
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The page could not be fetched
    FetchFailed(String),
    /// The server answered with a non-2xx status
    HttpStatus(u16),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::FetchFailed(e) => write!(f, "fetch failed: {}", e),
            AbortReason::HttpStatus(status) => write!(f, "HTTP {}", status),
        }
    }
}

/// Terminal result of a crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    Completed(StopReason),
    Aborted(AbortReason),
    /// Shutdown was requested; the checkpoint allows resuming
    Interrupted,
}

impl CrawlOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            CrawlOutcome::Completed(_) => 0,
            CrawlOutcome::Aborted(_) => 3,
            CrawlOutcome::Interrupted => 130,
        }
    }
}

/// Summary returned by [`CrawlOrchestrator::run`]
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub outcome: CrawlOutcome,
    pub stats: StatsSnapshot,
    /// Items held in the state, including those restored from the checkpoint
    pub items_total: usize,
    /// Pages fetched during this run
    pub pages_fetched: usize,
}

/// Main crawl orchestrator
pub struct CrawlOrchestrator {
    base_url: String,
    checkpoint_every: u64,
    fresh: bool,
    executor: RetryExecutor,
    parser: Box<dyn Parser>,
    store: Box<dyn CheckpointStore>,
    observer: Arc<dyn CrawlObserver>,
    sinks: Vec<Box<dyn Sink>>,
    shutdown: Arc<AtomicBool>,

    phase: CrawlPhase,
    state: CrawlState,
    stats: StatsCollector,
    pages_fetched: usize,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator from a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fresh` - Whether to ignore an existing checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOrchestrator)` - Ready to run
    /// * `Err(TidemarkError)` - The HTTP client or a selector could not be built
    ///
    /// Checkpoints written by this orchestrator carry no configuration hash;
    /// use [`CrawlOrchestrator::from_config_file`] or
    /// [`CrawlOrchestrator::new_with_hash`] to get drift warnings on resume.
    pub fn new(config: Config, fresh: bool) -> Result<Self, TidemarkError> {
        Self::build(config, None, fresh)
    }

    /// Creates an orchestrator whose checkpoints are tagged with `config_hash`
    pub fn new_with_hash(
        config: Config,
        config_hash: impl Into<String>,
        fresh: bool,
    ) -> Result<Self, TidemarkError> {
        Self::build(config, Some(config_hash.into()), fresh)
    }

    /// Loads the configuration at `path` and tags checkpoints with its hash
    pub fn from_config_file(path: &Path, fresh: bool) -> Result<Self, TidemarkError> {
        let (config, hash) = load_config_with_hash(path)?;
        Self::build(config, Some(hash), fresh)
    }

    fn build(
        config: Config,
        config_hash: Option<String>,
        fresh: bool,
    ) -> Result<Self, TidemarkError> {
        let executor = RetryExecutor::new(&config.crawl, &config.user_agent)?;
        let parser = HtmlParser::from_config(&config.extract)?;
        let mut store = JsonCheckpointStore::new(&config.output.checkpoint_path);
        if let Some(hash) = config_hash {
            store = store.with_config_hash(hash);
        }
        let sinks = sinks_from_config(&config.output);

        Ok(Self::with_parts(
            &config.crawl,
            executor,
            Box::new(parser),
            Box::new(store),
            Arc::new(TracingObserver),
            sinks,
            Arc::new(AtomicBool::new(false)),
            fresh,
        ))
    }

    /// Creates an orchestrator from explicit collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn with_parts(
        crawl: &CrawlConfig,
        executor: RetryExecutor,
        parser: Box<dyn Parser>,
        store: Box<dyn CheckpointStore>,
        observer: Arc<dyn CrawlObserver>,
        sinks: Vec<Box<dyn Sink>>,
        shutdown: Arc<AtomicBool>,
        fresh: bool,
    ) -> Self {
        let stats = StatsCollector::new(executor.current_delay());
        Self {
            base_url: crawl.base_url.clone(),
            checkpoint_every: crawl.checkpoint_every_n_items.max(1),
            fresh,
            executor,
            parser,
            store,
            observer,
            sinks,
            shutdown,
            phase: CrawlPhase::Idle,
            state: CrawlState::default(),
            stats,
            pages_fetched: 0,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Flag that stops the crawl at the next page or attempt boundary
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Runs the crawl to a terminal outcome
    ///
    /// The checkpoint is saved and the sinks are invoked on every exit path,
    /// including internal errors, which are propagated afterwards.
    pub async fn run(mut self) -> Result<CrawlReport, TidemarkError> {
        self.restore();

        match self.crawl().await {
            Ok(outcome) => Ok(self.finish(outcome)),
            Err(e) => {
                tracing::error!("Crawl failed: {}; saving emergency checkpoint", e);
                self.save_checkpoint();
                self.write_sinks();
                Err(e)
            }
        }
    }

    fn restore(&mut self) {
        self.state = if self.fresh {
            CrawlState::default()
        } else {
            self.store.load()
        };

        if self.state.is_fresh() {
            self.stats = StatsCollector::new(self.executor.current_delay());
        } else {
            self.executor.rate_mut().restore(self.state.current_delay);
            self.stats = StatsCollector::resume(&self.state.stats);
            self.stats.set_delay(self.executor.current_delay());
        }
    }

    async fn crawl(&mut self) -> Result<CrawlOutcome, TidemarkError> {
        let mut url = self
            .state
            .frontier
            .clone()
            .unwrap_or_else(|| self.base_url.clone());

        self.observer.on_start(&url, self.state.len());
        self.transition(CrawlPhase::Paging)?;

        let mut fetched_pages: HashSet<String> = HashSet::new();

        loop {
            self.state.frontier = Some(url.clone());
            fetched_pages.insert(page_key(&url));

            if self.shutdown_requested() {
                return self.interrupt();
            }

            let outcome = self
                .executor
                .fetch(&url, &mut self.stats, &self.shutdown)
                .await;
            self.observer.on_fetch_outcome(&url, &outcome);

            let page = match outcome {
                RequestOutcome::Success(page) => page,
                RequestOutcome::Cancelled => return self.interrupt(),
                _ if self.shutdown_requested() => return self.interrupt(),
                RequestOutcome::Blocked(reason) => {
                    return self.abort(AbortReason::FetchFailed(format!("blocked: {}", reason)))
                }
                RequestOutcome::TransientFailure(cause) => {
                    return self.abort(AbortReason::FetchFailed(cause))
                }
                RequestOutcome::ExhaustedRetries {
                    attempts,
                    last_error,
                } => {
                    return self.abort(AbortReason::FetchFailed(format!(
                        "{} (after {} attempts)",
                        last_error, attempts
                    )))
                }
            };

            self.pages_fetched += 1;
            fetched_pages.insert(page_key(&page.url));
            self.transition(CrawlPhase::PageFetched)?;

            if !page.is_success() {
                return self.abort(AbortReason::HttpStatus(page.status));
            }

            let parsed = match self.parser.extract(&page) {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.stats.record(StatsEvent::ParseFailed);
                    self.observer.on_parse_error(&url, &e);
                    return self.complete(StopReason::ParseFailure(e.to_string()));
                }
            };

            if parsed.skipped > 0 {
                tracing::debug!("Skipped {} items without a key on {}", parsed.skipped, url);
            }

            if parsed.records.is_empty() {
                return self.complete(StopReason::NoItems);
            }

            self.transition(CrawlPhase::ItemsExtracted)?;
            self.merge(parsed.records)?;

            match parsed.next_page {
                Some(next) if fetched_pages.contains(&page_key(&next)) => {
                    tracing::warn!("Next page {} was already fetched; stopping", next);
                    return self.complete(StopReason::PaginationCycle(next));
                }
                Some(next) => {
                    self.transition(CrawlPhase::NextPage)?;
                    self.transition(CrawlPhase::Paging)?;
                    url = next;
                }
                None => return self.complete(StopReason::NoNextPage),
            }
        }
    }

    /// Appends unseen records, checkpointing each time the item count hits a multiple of N
    fn merge(&mut self, records: Vec<Record>) -> Result<(), TidemarkError> {
        for record in records {
            if self.state.is_visited(&record.key) {
                self.observer.on_duplicate(&record.key);
                continue;
            }

            if self.phase == CrawlPhase::Checkpointed {
                self.transition(CrawlPhase::ItemsExtracted)?;
            }

            self.observer.on_item(&record);
            self.state.insert(record);
            self.stats.record(StatsEvent::ItemScraped);

            if self.stats.items_scraped() % self.checkpoint_every == 0 {
                self.save_checkpoint();
                self.transition(CrawlPhase::Checkpointed)?;
                self.observer.on_progress(&self.state.stats);
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<(), TidemarkError> {
        if !self.phase.can_transition_to(next) {
            return Err(TidemarkError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.observer.on_phase(self.phase, next);
        self.phase = next;
        Ok(())
    }

    fn complete(&mut self, reason: StopReason) -> Result<CrawlOutcome, TidemarkError> {
        self.transition(CrawlPhase::Done)?;
        Ok(CrawlOutcome::Completed(reason))
    }

    fn abort(&mut self, reason: AbortReason) -> Result<CrawlOutcome, TidemarkError> {
        self.transition(CrawlPhase::Aborted)?;
        Ok(CrawlOutcome::Aborted(reason))
    }

    fn interrupt(&mut self) -> Result<CrawlOutcome, TidemarkError> {
        self.transition(CrawlPhase::Aborted)?;
        Ok(CrawlOutcome::Interrupted)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Copies the live counters and delay into the state
    fn sync_state(&mut self) {
        let delay = self.executor.current_delay();
        self.stats.set_delay(delay);
        self.state.current_delay = delay;
        self.state.stats = self.stats.snapshot();
    }

    /// Saves the checkpoint; a failed save is reported and the crawl goes on
    fn save_checkpoint(&mut self) {
        self.sync_state();
        match self.store.save(&self.state) {
            Ok(()) => self.observer.on_checkpoint_saved(self.state.len()),
            Err(e) => self.observer.on_checkpoint_failed(&e),
        }
    }

    fn write_sinks(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.write(self.state.items(), &self.state.stats) {
                self.observer.on_sink_failed(sink.name(), &e);
            }
        }
    }

    fn finish(&mut self, outcome: CrawlOutcome) -> CrawlReport {
        self.save_checkpoint();
        self.write_sinks();

        let report = CrawlReport {
            outcome,
            stats: self.state.stats.clone(),
            items_total: self.state.len(),
            pages_fetched: self.pages_fetched,
        };
        self.observer.on_finished(&report);
        report
    }
}

/// Identity of a listing page within one run
fn page_key(url: &str) -> String {
    canonicalize(url)
        .map(String::from)
        .unwrap_or_else(|_| url.to_string())
}
