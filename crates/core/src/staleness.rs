use crate::time::EpochMs;

/// Default staleness threshold: a little over the display poll cadence, so a
/// healthy poller keeps its snapshot warm without back-to-back refreshes.
pub const DEFAULT_STALE_AFTER_MS: i64 = 45_000;

/// Time-based staleness judgment for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalePolicy {
    pub stale_after_ms: i64,
}

impl Default for StalePolicy {
    fn default() -> Self {
        Self {
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
        }
    }
}

impl StalePolicy {
    /// Policy with an explicit threshold.
    pub fn new(stale_after_ms: i64) -> Self {
        Self { stale_after_ms }
    }

    /// True when the snapshot is too old to trust without attempting a
    /// refresh. Never-fetched (`last_success = None`) is always stale.
    pub fn is_stale(&self, now: EpochMs, last_success: Option<EpochMs>) -> bool {
        match last_success {
            Some(ts) => now.saturating_sub(ts) > self.stale_after_ms,
            None => true,
        }
    }

    /// Graduated trust in the current data, for display indicators.
    ///
    /// `Aging` starts where staleness starts; `Expired` at three thresholds,
    /// i.e. several missed refresh opportunities in a row.
    pub fn trust(&self, now: EpochMs, last_success: Option<EpochMs>) -> TrustLevel {
        let Some(ts) = last_success else {
            return TrustLevel::Expired;
        };
        let age = now.saturating_sub(ts);
        if age <= self.stale_after_ms {
            TrustLevel::Fresh
        } else if age <= self.stale_after_ms.saturating_mul(3) {
            TrustLevel::Aging
        } else {
            TrustLevel::Expired
        }
    }
}

/// How much a display should trust what it is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    Fresh,
    Aging,
    Expired,
}
