use crate::time::EpochMs;
use serde::{Deserialize, Serialize};

/// Upstream-assigned identifier, unique within one resource type.
pub type Id = String;

/// What a machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Washer,
    Dryer,
}

/// Operating state of one machine.
///
/// The gateway occasionally reports one-poll flips between `Ready` and
/// `Running`; displays smooth those out through [`crate::hysteresis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Ready,
    Running,
    Offline,
}

/// One physical machine as served to displays.
///
/// Wire format is camelCase; the payload feeds a JS display layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: Id,
    pub kind: MachineKind,
    /// Human-facing name, e.g. "Washer 3".
    pub label: String,
    /// Physical position in the room, e.g. "A2".
    pub slot: String,
    pub status: MachineStatus,
    /// Milliseconds the current cycle has been running, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    pub updated_at_ms: EpochMs,
}

/// One settled ledger transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub id: Id,
    /// Machine the transaction ran on, when the ledger knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<Id>,
    pub amount_cents: i64,
    pub occurred_at_ms: EpochMs,
}

/// Pre-aggregated revenue card for one reporting window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxSummaryRow {
    /// Reporting window label, e.g. "today" or "7d".
    pub window: String,
    pub count: u64,
    pub gross_cents: i64,
    pub avg_cents: i64,
}

/// One leaderboard entry. The ranking formula lives upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderRow {
    pub id: Id,
    pub label: String,
    pub score: i64,
}

/// Which leaderboard a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardKind {
    Frequency,
    Revenue,
    Events,
}

impl LeaderboardKind {
    /// URL path segment, shared by our API and the upstream ledger.
    pub fn as_str(self) -> &'static str {
        match self {
            LeaderboardKind::Frequency => "frequency",
            LeaderboardKind::Revenue => "revenue",
            LeaderboardKind::Events => "events",
        }
    }
}

/// Per-transaction enrichment returned by the ledger's batch detail call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxDetail {
    pub id: Id,
    #[serde(default)]
    pub lines: Vec<String>,
}
