/// Crawl phase definitions for the orchestrator state machine
///
/// The orchestrator walks `Idle → Paging → PageFetched → ItemsExtracted →
/// (Checkpointed) → NextPage → Paging …` until it reaches `Done` or `Aborted`.
use std::fmt;

/// Represents where the orchestrator currently is within a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    // ===== Start =====
    /// Checkpoint loaded, nothing fetched yet
    Idle,

    // ===== Per-page Cycle =====
    /// Fetching the current page
    Paging,

    /// Current page fetched successfully
    PageFetched,

    /// Records of the current page merged into the crawl state
    ItemsExtracted,

    /// Periodic checkpoint written mid-page
    Checkpointed,

    /// Advancing the frontier to the next pagination link
    NextPage,

    // ===== Terminal States =====
    /// Pagination exhausted (no items, no next page, or unparseable page)
    Done,

    /// Fetch failed terminally, or cancellation was requested
    Aborted,
}

impl CrawlPhase {
    /// Returns true if no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// Any non-terminal phase may abort; `Done` is reachable from the points
    /// where pagination can be observed to end.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        if self.is_terminal() {
            return false;
        }

        match (*self, next) {
            (_, Aborted) => true,
            (Idle, Paging) => true,
            (Paging, PageFetched) => true,
            (PageFetched, ItemsExtracted | Done) => true,
            (ItemsExtracted, Checkpointed | NextPage | Done) => true,
            (Checkpointed, ItemsExtracted | NextPage | Done) => true,
            (NextPage, Paging) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Paging => "paging",
            Self::PageFetched => "page_fetched",
            Self::ItemsExtracted => "items_extracted",
            Self::Checkpointed => "checkpointed",
            Self::NextPage => "next_page",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
