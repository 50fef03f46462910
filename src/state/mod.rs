//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: The orchestrator state machine (idle, paging, done, aborted, ...)
//! - `CrawlState`: Items found so far, their keys, counters and resume point
//! - `Record`: One extracted item

mod crawl_state;
mod phase;

// Re-export main types
pub use crawl_state::{CrawlState, Record};
pub use phase::CrawlPhase;
