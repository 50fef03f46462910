//! HTTP fetcher with bounded retries
//!
//! This module performs every request of a crawl, including:
//! - Building the HTTP client with the configured user agent
//! - Waiting out the adaptive delay before each attempt
//! - Classifying responses as blocked or usable
//! - Retrying blocks (exponential backoff) and transport errors (linear backoff)
//! - Feeding the rate controller and the stats collector
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | 403, 429 or captcha body | Slow down, retry after `delay * 2^attempt` |
//! | Timeout, connect or body error | Retry after `delay * (attempt + 1)` |
//! | Request cannot be built | Immediate `TransientFailure` |
//! | Any other response | `Success`, speed up |
//!
//! At most `max_retries + 1` attempts are made per call.

use crate::config::{CrawlConfig, UserAgentConfig};
use crate::crawler::block::BlockDetector;
use crate::crawler::rate::RateController;
use crate::output::{StatsCollector, StatsEvent};
use reqwest::{redirect::Policy, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// How often a long sleep re-checks the shutdown flag
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// A response that was not classified as blocked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of one logical fetch
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Got a usable response (which may still carry a non-2xx status)
    Success(FetchedPage),

    /// Blocked, and shutdown was requested before the next attempt
    Blocked(String),

    /// Request could not be issued, or shutdown interrupted a transport retry cycle
    TransientFailure(String),

    /// Every allowed attempt failed
    ExhaustedRetries { attempts: u32, last_error: String },

    /// Shutdown was requested before the first attempt
    Cancelled,
}

/// Retry budget of the executor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Timeout of attempt 0
    pub base_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_timeout: config.base_timeout(),
        }
    }

    /// Timeout of the given attempt: grows by half the base per retry
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        let factor = 1.0 + 0.5 * f64::from(attempt);
        Duration::try_from_secs_f64(self.base_timeout.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }
}

/// Builds an HTTP client with proper configuration
///
/// No overall timeout is set on the client; every attempt carries its own.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Why the previous attempt failed
enum AttemptFailure {
    Blocked(String),
    Transport(String),
}

impl AttemptFailure {
    fn describe(&self) -> String {
        match self {
            AttemptFailure::Blocked(reason) => format!("blocked: {}", reason),
            AttemptFailure::Transport(error) => error.clone(),
        }
    }
}

/// Performs logical fetches for one crawl run
///
/// Owns the HTTP client and the rate controller; both live exactly as long as
/// the run.
pub struct RetryExecutor {
    client: Client,
    rate: RateController,
    detector: BlockDetector,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(crawl: &CrawlConfig, user_agent: &UserAgentConfig) -> crate::Result<Self> {
        let client = build_http_client(user_agent)?;
        let rate = RateController::new(crawl.min_delay, crawl.max_delay, crawl.initial_delay);
        Ok(Self::from_parts(client, rate, RetryPolicy::from_config(crawl)))
    }

    pub fn from_parts(client: Client, rate: RateController, policy: RetryPolicy) -> Self {
        Self {
            client,
            rate,
            detector: BlockDetector,
            policy,
        }
    }

    pub fn rate_mut(&mut self) -> &mut RateController {
        &mut self.rate
    }

    pub fn current_delay(&self) -> f64 {
        self.rate.current_delay()
    }

    /// Fetches `url`, retrying until a usable response or the budget runs out
    ///
    /// Both the pre-attempt delay and the backoff end early once `cancel` is
    /// set, and `cancel` is checked before every attempt, so a requested
    /// shutdown never starts a new request.
    pub async fn fetch(
        &mut self,
        url: &str,
        stats: &mut StatsCollector,
        cancel: &AtomicBool,
    ) -> RequestOutcome {
        let mut attempt: u32 = 0;
        let mut last_failure: Option<AttemptFailure> = None;

        loop {
            sleep_unless_cancelled(self.rate.current_delay(), cancel).await;

            if cancel.load(Ordering::SeqCst) {
                return match last_failure {
                    None => RequestOutcome::Cancelled,
                    Some(AttemptFailure::Blocked(reason)) => RequestOutcome::Blocked(reason),
                    Some(AttemptFailure::Transport(error)) => {
                        RequestOutcome::TransientFailure(error)
                    }
                };
            }

            if attempt > 0 {
                stats.record(StatsEvent::RetryPerformed);
            }

            stats.record(StatsEvent::RequestStarted);
            let timeout = self.policy.attempt_timeout(attempt);
            tracing::debug!(
                "GET {} (attempt {}/{}, timeout {:.1}s)",
                url,
                attempt + 1,
                self.policy.max_retries + 1,
                timeout.as_secs_f64()
            );

            let failure = match self.attempt(url, timeout).await {
                Ok(page) => {
                    let classification = self.detector.classify(page.status, &page.body);
                    if !classification.blocked {
                        self.rate.on_outcome(true);
                        stats.set_delay(self.rate.current_delay());
                        stats.record(StatsEvent::RequestSucceeded);
                        return RequestOutcome::Success(page);
                    }

                    tracing::warn!(
                        "Block detected on {} ({}), slowing down",
                        url,
                        classification.reason
                    );
                    stats.record(StatsEvent::BlockDetected);
                    self.rate.on_outcome(false);
                    stats.set_delay(self.rate.current_delay());
                    AttemptFailure::Blocked(classification.reason)
                }
                Err(e) if e.is_builder() => {
                    stats.record(StatsEvent::RequestFailed);
                    return RequestOutcome::TransientFailure(e.to_string());
                }
                Err(e) => {
                    tracing::warn!("Request to {} failed: {}", url, describe_error(&e));
                    AttemptFailure::Transport(describe_error(&e))
                }
            };

            if attempt >= self.policy.max_retries {
                if matches!(failure, AttemptFailure::Transport(_)) {
                    self.rate.on_outcome(false);
                    stats.set_delay(self.rate.current_delay());
                }
                stats.record(StatsEvent::RequestFailed);
                return RequestOutcome::ExhaustedRetries {
                    attempts: attempt + 1,
                    last_error: failure.describe(),
                };
            }

            let backoff = match &failure {
                AttemptFailure::Blocked(_) => {
                    self.rate.current_delay() * 2f64.powi(attempt.min(62) as i32)
                }
                AttemptFailure::Transport(_) => {
                    self.rate.current_delay() * f64::from(attempt + 1)
                }
            };
            tracing::debug!("Backing off {:.2}s before retrying {}", backoff, url);
            sleep_unless_cancelled(backoff, cancel).await;

            last_failure = Some(failure);
            attempt += 1;
        }
    }

    /// Issues one GET and reads the whole body under `timeout`
    async fn attempt(&self, url: &str, timeout: Duration) -> Result<FetchedPage, reqwest::Error> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else if e.is_body() || e.is_decode() {
        format!("Failed to read body: {}", e)
    } else {
        e.to_string()
    }
}

/// Sleeps for `secs`, waking within `CANCEL_POLL` once `cancel` is set
async fn sleep_unless_cancelled(secs: f64, cancel: &AtomicBool) {
    let duration = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
    let deadline = Instant::now().checked_add(duration);

    while !cancel.load(Ordering::SeqCst) {
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => CANCEL_POLL,
        };
        if remaining.is_zero() {
            return;
        }
        tokio::time::sleep(remaining.min(CANCEL_POLL)).await;
    }
}
