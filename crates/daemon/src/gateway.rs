//! Upstream clients: the machine gateway and the transaction ledger.
//!
//! Every call here is one bounded round-trip that either returns typed rows
//! or a [`FetchError`]; retry policy lives with the caller (the cache
//! re-fetches on the next stale request).

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

use washboard_core::api::{DetailsRequest, DetailsResponse};
use washboard_core::model::{LeaderRow, LeaderboardKind, Machine, TxDetail, TxRecord, TxSummaryRow};

use crate::config::{GatewayConfig, LedgerConfig};

/// Why an upstream round-trip produced no data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream timed out")]
    Timeout,
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(#[source] reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(err)
        }
    }
}

/// Client for the machine gateway.
#[derive(Clone)]
pub struct MachineGateway {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl MachineGateway {
    pub fn new(client: Client, cfg: &GatewayConfig) -> Self {
        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            bearer_token: cfg.bearer_token.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }

    /// One round-trip for the full machine list.
    pub async fn machines(&self) -> Result<Vec<Machine>, FetchError> {
        get_json(
            &self.client,
            &format!("{}/machines", self.base_url),
            self.bearer_token.as_deref(),
            self.timeout,
        )
        .await
    }
}

/// Client for the transaction ledger.
#[derive(Clone)]
pub struct TxLedger {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
    timeout: Duration,
    tx_limit: u32,
}

impl TxLedger {
    pub fn new(client: Client, cfg: &LedgerConfig) -> Self {
        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            bearer_token: cfg.bearer_token.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms),
            tx_limit: cfg.tx_limit,
        }
    }

    pub async fn summary(&self) -> Result<Vec<TxSummaryRow>, FetchError> {
        get_json(
            &self.client,
            &format!("{}/transactions/summary", self.base_url),
            self.bearer_token.as_deref(),
            self.timeout,
        )
        .await
    }

    pub async fn transactions(&self) -> Result<Vec<TxRecord>, FetchError> {
        get_json(
            &self.client,
            &format!("{}/transactions?limit={}", self.base_url, self.tx_limit),
            self.bearer_token.as_deref(),
            self.timeout,
        )
        .await
    }

    pub async fn leaderboard(&self, board: LeaderboardKind) -> Result<Vec<LeaderRow>, FetchError> {
        get_json(
            &self.client,
            &format!("{}/leaderboards/{}", self.base_url, board.as_str()),
            self.bearer_token.as_deref(),
            self.timeout,
        )
        .await
    }

    /// One bulk detail call for a whole export. `timeout` is the caller's
    /// batch budget (proportional to `ids.len()`), not the per-fetch default.
    pub async fn details(
        &self,
        ids: &[String],
        timeout: Duration,
    ) -> Result<Vec<TxDetail>, FetchError> {
        let mut req = self
            .client
            .post(format!("{}/transactions/details", self.base_url))
            .timeout(timeout)
            .json(&DetailsRequest { ids: ids.to_vec() });
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?.error_for_status()?;
        let body = resp.json::<DetailsResponse>().await?;
        Ok(body.details)
    }
}

async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    bearer_token: Option<&str>,
    timeout: Duration,
) -> Result<T, FetchError> {
    let mut req = client.get(url).timeout(timeout);
    if let Some(token) = bearer_token {
        req = req.bearer_auth(token);
    }
    let resp = req.send().await?.error_for_status()?;
    Ok(resp.json::<T>().await?)
}
