//! Terminal rendering of the working copy.

use washboard_core::hysteresis::HysteresisFilter;
use washboard_core::model::{MachineKind, MachineStatus};
use washboard_core::staleness::{StalePolicy, TrustLevel};
use washboard_core::time::{rfc3339_ms, EpochMs};

use crate::poll::Working;

/// Render the machine grid to stdout.
///
/// Statuses pass through the hysteresis filter, so one spurious flip from
/// the gateway does not flicker the grid.
pub fn render(filter: &mut HysteresisFilter, working: &Working, policy: &StalePolicy, now: EpochMs) {
    println!();
    println!("{}", header_line(working, policy, now));

    if !working.populated {
        println!("  waiting for the first snapshot...");
        return;
    }
    if working.machines.is_empty() {
        println!("  no machines reported");
        return;
    }

    for m in &working.machines {
        let shown = filter.apply(&m.id, m.status, now);
        println!(
            "  {:<4} {:<7} {:<20} {}",
            m.slot,
            kind_cell(m.kind),
            m.label,
            status_cell(shown, m.elapsed_ms)
        );
    }
}

fn header_line(working: &Working, policy: &StalePolicy, now: EpochMs) -> String {
    let trust = policy.trust(now, working.last_success_ms);
    let updated = working
        .last_success_ms
        .map(rfc3339_ms)
        .unwrap_or_else(|| "never".to_string());
    format!(
        "washboard  [{}]  updated {}{}",
        trust_cell(trust),
        updated,
        if working.stale { "  (stale)" } else { "" }
    )
}

fn trust_cell(trust: TrustLevel) -> &'static str {
    match trust {
        TrustLevel::Fresh => "live",
        TrustLevel::Aging => "aging",
        TrustLevel::Expired => "expired",
    }
}

fn kind_cell(kind: MachineKind) -> &'static str {
    match kind {
        MachineKind::Washer => "washer",
        MachineKind::Dryer => "dryer",
    }
}

fn status_cell(status: MachineStatus, elapsed_ms: Option<u64>) -> String {
    match (status, elapsed_ms) {
        (MachineStatus::Running, Some(ms)) => format!("running {}", fmt_elapsed(ms)),
        (MachineStatus::Running, None) => "running".to_string(),
        (MachineStatus::Ready, _) => "ready".to_string(),
        (MachineStatus::Offline, _) => "offline".to_string(),
    }
}

fn fmt_elapsed(ms: u64) -> String {
    let mins = ms / 60_000;
    let secs = (ms % 60_000) / 1_000;
    format!("{mins}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_formats_as_minutes_and_seconds() {
        assert_eq!(fmt_elapsed(0), "0:00");
        assert_eq!(fmt_elapsed(59_999), "0:59");
        assert_eq!(fmt_elapsed(60_000), "1:00");
        assert_eq!(fmt_elapsed(3_725_000), "62:05");
    }

    #[test]
    fn status_cells_read_naturally() {
        assert_eq!(
            status_cell(MachineStatus::Running, Some(90_000)),
            "running 1:30"
        );
        assert_eq!(status_cell(MachineStatus::Running, None), "running");
        assert_eq!(status_cell(MachineStatus::Ready, Some(5)), "ready");
        assert_eq!(status_cell(MachineStatus::Offline, None), "offline");
    }

    #[test]
    fn header_reflects_trust_and_staleness() {
        let policy = StalePolicy::new(45_000);
        let mut w = Working::default();
        w.populated = true;
        w.last_success_ms = Some(0);

        let line = header_line(&w, &policy, 10_000);
        assert!(line.contains("[live]"));
        assert!(!line.contains("(stale)"));

        w.stale = true;
        let line = header_line(&w, &policy, 50_000);
        assert!(line.contains("[aging]"));
        assert!(line.contains("(stale)"));

        w.last_success_ms = None;
        let line = header_line(&w, &policy, 50_000);
        assert!(line.contains("[expired]"));
        assert!(line.contains("updated never"));
    }
}
