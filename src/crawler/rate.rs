//! Adaptive inter-request delay
//!
//! Successes shrink the delay by 10% down to `min_delay`; failures grow it by
//! 50% up to `max_delay`. The adjustment is purely multiplicative.

const SUCCESS_FACTOR: f64 = 0.9;
const FAILURE_FACTOR: f64 = 1.5;

/// Tracks the delay to wait before each request
#[derive(Debug, Clone, PartialEq)]
pub struct RateController {
    delay: f64,
    min_delay: f64,
    max_delay: f64,
}

impl Default for RateController {
    fn default() -> Self {
        Self::new(0.5, 10.0, 1.0)
    }
}

impl RateController {
    /// Creates a controller; `initial_delay` is clamped into the bounds
    pub fn new(min_delay: f64, max_delay: f64, initial_delay: f64) -> Self {
        Self {
            delay: initial_delay.clamp(min_delay, max_delay),
            min_delay,
            max_delay,
        }
    }

    /// Current delay in seconds
    pub fn current_delay(&self) -> f64 {
        self.delay
    }

    pub fn on_outcome(&mut self, success: bool) {
        self.delay = if success {
            (self.delay * SUCCESS_FACTOR).max(self.min_delay)
        } else {
            (self.delay * FAILURE_FACTOR).min(self.max_delay)
        };
        tracing::trace!("Delay adjusted to {:.3}s", self.delay);
    }

    /// Restores a persisted delay, clamped into the bounds
    pub fn restore(&mut self, delay: f64) {
        if delay.is_finite() {
            self.delay = delay.clamp(self.min_delay, self.max_delay);
        }
    }
}
