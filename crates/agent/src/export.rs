//! Transaction export: one list fetch, one batch detail call, one bundle.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

use washboard_core::api::{self, DetailsRequest, DetailsResponse};
use washboard_core::model::{TxDetail, TxRecord};
use washboard_core::snapshot::Snapshot;
use washboard_core::time::{now_ms, rfc3339_ms};

/// Batch detail budget: base plus a per-transaction allowance, capped.
/// Slightly above the daemon's own upstream budget so we never give up
/// before it does.
const DETAIL_BASE_TIMEOUT_MS: u64 = 45_000;
const DETAIL_PER_ITEM_MS: u64 = 1_000;
const DETAIL_TIMEOUT_CAP_MS: u64 = 330_000;

const LIST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ExportBundle {
    exported_at: String,
    /// True when the daemon served the transaction list from a stale
    /// snapshot; the export is then best-effort, not authoritative.
    stale: bool,
    transactions: Vec<TxRecord>,
    details: Vec<TxDetail>,
}

/// Fetch, enrich and write one export bundle. Ctrl-C drops the in-flight
/// request and aborts the export cleanly.
pub async fn run(daemon_url: &str, client_id: &str, out_dir: &Path) -> Result<()> {
    let client = Client::new();

    let bundle = tokio::select! {
        res = collect(&client, daemon_url, client_id) => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("export aborted");
            return Ok(());
        }
    };

    let dir = out_dir.join(format!("export-{}", ulid::Ulid::new()));
    std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join("transactions.json");
    let bytes = serde_json::to_vec_pretty(&bundle).context("serialize export")?;
    std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;

    println!(
        "exported {} transactions ({} details) to {}",
        bundle.transactions.len(),
        bundle.details.len(),
        path.display()
    );
    if bundle.stale {
        println!("note: the daemon served stale data; re-run once it recovers");
    }
    Ok(())
}

async fn collect(client: &Client, daemon_url: &str, client_id: &str) -> Result<ExportBundle> {
    let snapshot = client
        .get(format!("{daemon_url}/v1/transactions"))
        .header(api::HDR_CLIENT_ID, client_id)
        .timeout(LIST_TIMEOUT)
        .send()
        .await
        .context("transactions request")?
        .error_for_status()
        .context("transactions status")?
        .json::<Snapshot<TxRecord>>()
        .await
        .context("transactions decode")?;

    let ids: Vec<String> = snapshot.items.iter().map(|t| t.id.clone()).collect();
    let details = if ids.is_empty() {
        Vec::new()
    } else {
        client
            .post(format!("{daemon_url}/v1/transactions/details"))
            .header(api::HDR_CLIENT_ID, client_id)
            .timeout(detail_timeout(ids.len()))
            .json(&DetailsRequest { ids })
            .send()
            .await
            .context("details request")?
            .error_for_status()
            .context("details status")?
            .json::<DetailsResponse>()
            .await
            .context("details decode")?
            .details
    };

    Ok(ExportBundle {
        exported_at: rfc3339_ms(now_ms()),
        stale: snapshot.meta.stale,
        transactions: snapshot.items,
        details,
    })
}

/// One batch call gets one budget, proportional to its size.
fn detail_timeout(count: usize) -> Duration {
    let ms = DETAIL_BASE_TIMEOUT_MS
        .saturating_add(DETAIL_PER_ITEM_MS.saturating_mul(count as u64))
        .min(DETAIL_TIMEOUT_CAP_MS);
    Duration::from_millis(ms)
}
