use anyhow::Context;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::{LeaderRow, Machine, MachineKind, MachineStatus, TxRecord, TxSummaryRow};

/// Projection of an entity down to the fields a viewer can see change.
///
/// Fingerprints hash this view instead of the entity itself so volatile
/// counters (elapsed cycle time, capture timestamps) do not defeat
/// conditional requests.
pub trait StableView {
    /// What gets hashed.
    type View: Serialize;

    /// Project to the hashable view.
    fn stable_view(&self) -> Self::View;
}

/// Stable projection of a [`Machine`]: identity, placement and status.
///
/// `elapsed_ms` and `updated_at_ms` move on nearly every upstream poll and
/// are deliberately excluded.
#[derive(Debug, Serialize)]
pub struct MachineView {
    pub id: String,
    pub kind: MachineKind,
    pub label: String,
    pub slot: String,
    pub status: MachineStatus,
}

impl StableView for Machine {
    type View = MachineView;

    fn stable_view(&self) -> MachineView {
        MachineView {
            id: self.id.clone(),
            kind: self.kind,
            label: self.label.clone(),
            slot: self.slot.clone(),
            status: self.status,
        }
    }
}

// Ledger rows carry no volatile fields; they project to themselves.

impl StableView for TxRecord {
    type View = TxRecord;

    fn stable_view(&self) -> TxRecord {
        self.clone()
    }
}

impl StableView for TxSummaryRow {
    type View = TxSummaryRow;

    fn stable_view(&self) -> TxSummaryRow {
        self.clone()
    }
}

impl StableView for LeaderRow {
    type View = LeaderRow;

    fn stable_view(&self) -> LeaderRow {
        self.clone()
    }
}

/// Content fingerprint over the stable views of an ordered entity list.
///
/// Notes:
/// - We serialize using serde_json, relying on deterministic struct field
///   order, so equal views give equal digests across processes.
/// - Content addressing only, not a security property.
pub fn fingerprint<T: StableView>(items: &[T]) -> anyhow::Result<String> {
    let views: Vec<T::View> = items.iter().map(StableView::stable_view).collect();
    let bytes = serde_json::to_vec(&views).context("serialize stable view")?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(hex::encode(hasher.finalize()))
}
