//! Anti-scraping block detection

/// Status codes servers answer with when refusing a scraper
const BLOCKING_STATUS_CODES: &[u16] = &[403, 429];

/// Body marker of a challenge page
const CAPTCHA_MARKER: &str = "captcha";

/// Result of classifying one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub blocked: bool,
    /// What triggered the block; empty when not blocked
    pub reason: String,
}

impl Classification {
    fn clear() -> Self {
        Self {
            blocked: false,
            reason: String::new(),
        }
    }

    fn blocked(reason: String) -> Self {
        Self {
            blocked: true,
            reason,
        }
    }
}

/// Classifies responses as blocked or not
///
/// A response is blocked iff its status is 403 or 429, or its body contains
/// "captcha" in any letter case. Nothing else blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockDetector;

impl BlockDetector {
    pub fn classify(&self, status: u16, body: &str) -> Classification {
        if BLOCKING_STATUS_CODES.contains(&status) {
            return Classification::blocked(format!("HTTP {}", status));
        }

        if body.to_lowercase().contains(CAPTCHA_MARKER) {
            return Classification::blocked("captcha marker in body".to_string());
        }

        Classification::clear()
    }
}
