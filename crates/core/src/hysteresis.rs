use std::collections::HashMap;

use crate::model::MachineStatus;
use crate::time::EpochMs;

/// Default hold window: shorter than any real machine cycle, longer than the
/// gateway's spurious one-poll status flips.
pub const DEFAULT_HOLD_MS: i64 = 3_000;

#[derive(Debug, Clone, Copy)]
struct Held {
    status: MachineStatus,
    observed_at_ms: EpochMs,
}

/// Per-machine debounce of displayed status.
///
/// A new status only propagates once the previously shown one has been on
/// screen for the hold window; faster flips keep showing the old value.
/// Displays accept up to one window of lag in exchange for a grid that does
/// not flicker.
#[derive(Debug)]
pub struct HysteresisFilter {
    hold_ms: i64,
    held: HashMap<String, Held>,
}

impl HysteresisFilter {
    /// Filter with an explicit hold window.
    pub fn new(hold_ms: i64) -> Self {
        Self {
            hold_ms,
            held: HashMap::new(),
        }
    }

    /// Feed one observed status; returns the status to display.
    ///
    /// Within the hold window the recorded entry is returned untouched. Its
    /// timestamp is not refreshed, so a change that persists past the window
    /// propagates on the next sample. At or beyond the window the sample is
    /// recorded (restarting the window) and shown as-is.
    pub fn apply(&mut self, id: &str, observed: MachineStatus, now: EpochMs) -> MachineStatus {
        match self.held.get(id) {
            Some(h) if now.saturating_sub(h.observed_at_ms) < self.hold_ms => h.status,
            _ => {
                self.held.insert(
                    id.to_string(),
                    Held {
                        status: observed,
                        observed_at_ms: now,
                    },
                );
                observed
            }
        }
    }

    /// Number of machines currently tracked.
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// True when no machine has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl Default for HysteresisFilter {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_passes_through() {
        let mut f = HysteresisFilter::default();
        assert_eq!(f.apply("W01", MachineStatus::Ready, 0), MachineStatus::Ready);
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn flip_inside_window_is_held() {
        let mut f = HysteresisFilter::new(3_000);
        assert_eq!(f.apply("W01", MachineStatus::Ready, 0), MachineStatus::Ready);
        assert_eq!(
            f.apply("W01", MachineStatus::Running, 1_000),
            MachineStatus::Ready
        );
        // The held entry was not refreshed at t=1000, so the window still
        // ends at t=3000.
        assert_eq!(
            f.apply("W01", MachineStatus::Running, 3_000),
            MachineStatus::Running
        );
    }
}
