use std::time::Duration;

use rand::Rng;

/// Default poll window for displays: 30-60 s.
pub const DEFAULT_POLL_WINDOW: PollWindow = PollWindow {
    min_ms: 30_000,
    max_ms: 60_000,
};

/// Randomized poll scheduling window.
///
/// Every cycle draws a fresh delay uniformly from `[min_ms, max_ms]`, so a
/// fleet of displays powered on together spreads its requests instead of
/// thundering in phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl PollWindow {
    /// Window spanning `[min_ms, max_ms]`.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Draw the delay before the next poll. A degenerate window
    /// (`min >= max`) always yields `min`.
    pub fn next_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let ms = if self.min_ms >= self.max_ms {
            self.min_ms
        } else {
            rng.gen_range(self.min_ms..=self.max_ms)
        };
        Duration::from_millis(ms)
    }
}

impl Default for PollWindow {
    fn default() -> Self {
        DEFAULT_POLL_WINDOW
    }
}
