use crate::time::EpochMs;
use serde::{Deserialize, Serialize};

/// Capture metadata attached to every served snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// When the data was last fetched successfully. `None` until the first
    /// successful fetch.
    pub ts: Option<EpochMs>,
    /// True when the data is older than the resource's staleness threshold,
    /// or has never been fetched at all.
    pub stale: bool,
}

/// Last known full state of one resource, as captured from upstream.
///
/// Replaced wholesale on every successful refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub meta: SnapshotMeta,
}

impl<T> Snapshot<T> {
    /// Placeholder served before the first successful fetch.
    pub fn placeholder() -> Self {
        Self {
            items: Vec::new(),
            meta: SnapshotMeta { ts: None, stale: true },
        }
    }

    /// Snapshot captured at `ts`.
    pub fn captured(items: Vec<T>, ts: EpochMs, stale: bool) -> Self {
        Self {
            items,
            meta: SnapshotMeta { ts: Some(ts), stale },
        }
    }
}

/// Borrowing serializer with the same wire shape as [`Snapshot`], for
/// responding without cloning the item list.
#[derive(Debug, Serialize)]
pub struct SnapshotRef<'a, T> {
    pub items: &'a [T],
    pub meta: SnapshotMeta,
}
