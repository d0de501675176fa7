//! Daemon configuration, loaded once at startup from a TOML file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use washboard_core::staleness::{StalePolicy, DEFAULT_STALE_AFTER_MS};

/// Hard ceiling on one batch detail call, however large the batch.
pub const DETAIL_TIMEOUT_CAP_MS: u64 = 300_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Machine gateway: the service that talks to the physical machines.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL, e.g. "http://10.0.0.5:9700".
    pub base_url: String,
    /// Optional bearer token attached to every gateway request.
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Per-request timeout in milliseconds. Must stay below the displays'
    /// own request timeout, since a stale-path request waits this out.
    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
}

/// Transaction ledger: summaries, recent transactions, leaderboards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub base_url: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Per-request timeout for list/summary/leaderboard fetches (ms).
    #[serde(default = "default_ledger_timeout_ms")]
    pub timeout_ms: u64,
    /// How many transactions the list endpoint asks upstream for.
    #[serde(default = "default_tx_limit")]
    pub tx_limit: u32,
    /// Batch detail budget: `base + per_item * ids`, capped at
    /// [`DETAIL_TIMEOUT_CAP_MS`].
    #[serde(default = "default_detail_base_timeout_ms")]
    pub detail_base_timeout_ms: u64,
    #[serde(default = "default_detail_per_item_ms")]
    pub detail_per_item_ms: u64,
}

/// Staleness thresholds per resource family.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Machine state goes stale after this many milliseconds.
    pub machines_stale_after_ms: i64,
    /// Ledger-backed resources go stale after this many milliseconds.
    pub ledger_stale_after_ms: i64,
}

fn default_gateway_timeout_ms() -> u64 {
    10_000
}

fn default_ledger_timeout_ms() -> u64 {
    30_000
}

fn default_tx_limit() -> u32 {
    200
}

fn default_detail_base_timeout_ms() -> u64 {
    30_000
}

fn default_detail_per_item_ms() -> u64 {
    1_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            machines_stale_after_ms: DEFAULT_STALE_AFTER_MS,
            ledger_stale_after_ms: DEFAULT_STALE_AFTER_MS,
        }
    }
}

impl CacheConfig {
    pub fn machines_policy(&self) -> StalePolicy {
        StalePolicy::new(self.machines_stale_after_ms)
    }

    pub fn ledger_policy(&self) -> StalePolicy {
        StalePolicy::new(self.ledger_stale_after_ms)
    }
}

impl LedgerConfig {
    /// Timeout budget for one batch detail call of `ids` transactions.
    pub fn detail_timeout(&self, ids: usize) -> Duration {
        let ms = self
            .detail_base_timeout_ms
            .saturating_add(self.detail_per_item_ms.saturating_mul(ids as u64))
            .min(DETAIL_TIMEOUT_CAP_MS);
        Duration::from_millis(ms)
    }
}

impl Config {
    /// Starter config pointing at local upstreams; written by
    /// `--init-config`.
    pub fn default_local() -> Self {
        Self {
            gateway: GatewayConfig {
                base_url: "http://127.0.0.1:9700".to_string(),
                bearer_token: None,
                timeout_ms: default_gateway_timeout_ms(),
            },
            ledger: LedgerConfig {
                base_url: "http://127.0.0.1:9701".to_string(),
                bearer_token: None,
                timeout_ms: default_ledger_timeout_ms(),
                tx_limit: default_tx_limit(),
                detail_base_timeout_ms: default_detail_base_timeout_ms(),
                detail_per_item_ms: default_detail_per_item_ms(),
            },
            cache: CacheConfig::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| "parse washboard.toml")?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
