//! HTTP surface: conditional snapshot endpoints plus the batch detail
//! pass-through.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use washboard_core::api::{self, DetailsRequest, DetailsResponse};
use washboard_core::model::{LeaderRow, LeaderboardKind, Machine, TxRecord, TxSummaryRow};
use washboard_core::snapshot::{SnapshotMeta, SnapshotRef};
use washboard_core::time::{now_ms, rfc3339_ms};

use crate::cache::{ResourceCache, Served};
use crate::config::Config;
use crate::error::ApiError;
use crate::gateway::{MachineGateway, TxLedger};

/// Shared handler state: one cache per resource plus the upstream clients.
pub struct AppState {
    pub cfg: Config,
    pub gateway: MachineGateway,
    pub ledger: TxLedger,
    pub machines: ResourceCache<Machine>,
    pub tx_summary: ResourceCache<TxSummaryRow>,
    pub transactions: ResourceCache<TxRecord>,
    pub lb_frequency: ResourceCache<LeaderRow>,
    pub lb_revenue: ResourceCache<LeaderRow>,
    pub lb_events: ResourceCache<LeaderRow>,
}

impl AppState {
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let gateway = MachineGateway::new(client.clone(), &cfg.gateway);
        let ledger = TxLedger::new(client, &cfg.ledger);
        let machines_policy = cfg.cache.machines_policy();
        let ledger_policy = cfg.cache.ledger_policy();
        Ok(Self {
            gateway,
            ledger,
            machines: ResourceCache::new("machines", machines_policy)?,
            tx_summary: ResourceCache::new("tx_summary", ledger_policy)?,
            transactions: ResourceCache::new("transactions", ledger_policy)?,
            lb_frequency: ResourceCache::new("lb_frequency", ledger_policy)?,
            lb_revenue: ResourceCache::new("lb_revenue", ledger_policy)?,
            lb_events: ResourceCache::new("lb_events", ledger_policy)?,
            cfg,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/machines", get(machines))
        .route("/v1/transactions/summary", get(tx_summary))
        .route("/v1/transactions", get(transactions))
        .route("/v1/transactions/details", post(tx_details))
        .route("/v1/leaderboards/frequency", get(lb_frequency))
        .route("/v1/leaderboards/revenue", get(lb_revenue))
        .route("/v1/leaderboards/events", get(lb_events))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Root span for one request, carrying the display client's self-reported
/// id so fleet logs can be sliced per kiosk.
fn request_span(req: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        client = client_id(req.headers()),
    )
}

fn client_id(headers: &HeaderMap) -> &str {
    headers
        .get(api::HDR_CLIENT_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

async fn healthz() -> &'static str {
    "ok"
}

async fn machines(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let served = st.machines.serve(now_ms(), || st.gateway.machines()).await;
    conditional_response(&headers, &served)
}

async fn tx_summary(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let served = st.tx_summary.serve(now_ms(), || st.ledger.summary()).await;
    conditional_response(&headers, &served)
}

async fn transactions(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let served = st
        .transactions
        .serve(now_ms(), || st.ledger.transactions())
        .await;
    conditional_response(&headers, &served)
}

async fn lb_frequency(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let served = st
        .lb_frequency
        .serve(now_ms(), || st.ledger.leaderboard(LeaderboardKind::Frequency))
        .await;
    conditional_response(&headers, &served)
}

async fn lb_revenue(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let served = st
        .lb_revenue
        .serve(now_ms(), || st.ledger.leaderboard(LeaderboardKind::Revenue))
        .await;
    conditional_response(&headers, &served)
}

async fn lb_events(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let served = st
        .lb_events
        .serve(now_ms(), || st.ledger.leaderboard(LeaderboardKind::Events))
        .await;
    conditional_response(&headers, &served)
}

/// Batch detail pass-through for exports. Unlike the snapshot endpoints
/// there is nothing cached to degrade to, so upstream failure surfaces as
/// 502 rather than silently emptying an export.
async fn tx_details(
    State(st): State<Arc<AppState>>,
    Json(req): Json<DetailsRequest>,
) -> Result<Json<DetailsResponse>, ApiError> {
    if req.ids.is_empty() {
        return Err(ApiError::bad_request("ids must be non-empty"));
    }
    let timeout = st.cfg.ledger.detail_timeout(req.ids.len());
    let details = st.ledger.details(&req.ids, timeout).await?;
    Ok(Json(DetailsResponse { details }))
}

/// Turn one cache answer into a conditional HTTP response.
///
/// A matching `If-None-Match` yields `304 Not Modified`; either way the
/// validator and freshness headers go out, so a 304 still lets a client
/// refresh its staleness indicator. The "nothing changed" branch is a
/// success, distinguishable from failures by status code alone.
pub fn conditional_response<T: Serialize>(
    headers: &HeaderMap,
    served: &Served<T>,
) -> Result<Response, ApiError> {
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| api::if_none_match_matches(v, &served.fingerprint));

    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        let body = SnapshotRef {
            items: served.items.as_slice(),
            meta: SnapshotMeta {
                ts: served.last_success_ms,
                stale: served.stale,
            },
        };
        Json(&body).into_response()
    };

    let etag =
        HeaderValue::from_str(&api::quote_etag(&served.fingerprint)).map_err(ApiError::internal)?;
    let last_success = served.last_success_ms.map(rfc3339_ms).unwrap_or_default();
    let last_success = HeaderValue::from_str(&last_success).map_err(ApiError::internal)?;
    let stale = HeaderValue::from_static(if served.stale { "true" } else { "false" });

    let hdrs = response.headers_mut();
    hdrs.insert(header::ETAG, etag);
    hdrs.insert(api::HDR_DATA_STALE, stale);
    hdrs.insert(api::HDR_LAST_SUCCESS, last_success);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FetchError;
    use washboard_core::model::{MachineKind, MachineStatus};
    use washboard_core::staleness::StalePolicy;

    fn dryer(id: &str, status: MachineStatus, elapsed_ms: Option<u64>) -> Machine {
        Machine {
            id: id.to_string(),
            kind: MachineKind::Dryer,
            label: format!("Dryer {id}"),
            slot: id.to_string(),
            status,
            elapsed_ms,
            updated_at_ms: 0,
        }
    }

    fn served(machines: Vec<Machine>, stale: bool) -> Served<Machine> {
        Served {
            fingerprint: washboard_core::fingerprint::fingerprint(&machines).unwrap(),
            items: Arc::new(machines),
            stale,
            last_success_ms: Some(1_000),
        }
    }

    fn etag_of(resp: &Response) -> String {
        resp.headers()
            .get(header::ETAG)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn first_request_gets_200_with_validator_headers() {
        let served = served(vec![dryer("D01", MachineStatus::Ready, None)], false);
        let resp = conditional_response(&HeaderMap::new(), &served).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(etag_of(&resp), api::quote_etag(&served.fingerprint));
        assert_eq!(resp.headers().get(api::HDR_DATA_STALE).unwrap(), "false");
        assert_eq!(
            resp.headers().get(api::HDR_LAST_SUCCESS).unwrap(),
            "1970-01-01T00:00:01.000Z"
        );
    }

    #[test]
    fn matching_precondition_gets_304_with_headers() {
        let served = served(vec![dryer("D01", MachineStatus::Ready, None)], false);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_str(&api::quote_etag(&served.fingerprint)).unwrap(),
        );
        let resp = conditional_response(&headers, &served).unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        // Headers still present so the client can re-grade staleness.
        assert!(resp.headers().get(header::ETAG).is_some());
        assert!(resp.headers().get(api::HDR_DATA_STALE).is_some());
        assert!(resp.headers().get(api::HDR_LAST_SUCCESS).is_some());
    }

    #[test]
    fn changed_content_gets_200_with_a_new_validator() {
        let before = served(vec![dryer("D01", MachineStatus::Ready, None)], false);
        let after = served(vec![dryer("D01", MachineStatus::Running, Some(1))], false);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_str(&api::quote_etag(&before.fingerprint)).unwrap(),
        );
        let resp = conditional_response(&headers, &after).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_ne!(etag_of(&resp), api::quote_etag(&before.fingerprint));
    }

    #[test]
    fn degraded_snapshot_reports_staleness_not_errors() {
        let served = served(vec![dryer("D01", MachineStatus::Ready, None)], true);
        let resp = conditional_response(&HeaderMap::new(), &served).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(api::HDR_DATA_STALE).unwrap(), "true");
    }

    #[test]
    fn request_spans_read_the_client_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_id(&headers), "-");
        headers.insert(api::HDR_CLIENT_ID, HeaderValue::from_static("kiosk-7"));
        assert_eq!(client_id(&headers), "kiosk-7");
    }

    #[tokio::test]
    async fn empty_detail_batches_are_rejected() {
        let st = Arc::new(AppState::new(Config::default_local()).unwrap());

        let err = tx_details(State(Arc::clone(&st)), Json(DetailsRequest { ids: vec![] }))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        // A bare `{}` body defaults to the same empty list and must not
        // reach the upstream either.
        let req: DetailsRequest = serde_json::from_str("{}").unwrap();
        let err = tx_details(State(st), Json(req)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn never_succeeded_renders_an_empty_last_success() {
        let served = Served::<Machine> {
            items: Arc::new(Vec::new()),
            fingerprint: washboard_core::fingerprint::fingerprint::<Machine>(&[]).unwrap(),
            stale: true,
            last_success_ms: None,
        };
        let resp = conditional_response(&HeaderMap::new(), &served).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(api::HDR_LAST_SUCCESS).unwrap(), "");
    }

    // The dashboard's elapsed-minute tick: a machine mid-cycle reports a
    // larger elapsed time on the next refresh and nothing else changes. The
    // revalidating poll must see a 304.
    #[tokio::test]
    async fn elapsed_only_refresh_revalidates_to_304() {
        let cache: ResourceCache<Machine> =
            ResourceCache::new("machines", StalePolicy::new(45_000)).unwrap();

        let first = cache
            .serve(1_000, || async {
                Ok(vec![dryer("D05", MachineStatus::Running, Some(60_000))])
            })
            .await;
        let resp = conditional_response(&HeaderMap::new(), &first).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let etag = etag_of(&resp);

        // Next poll a minute later: stale threshold passed, refresh returns
        // the same machine with only elapsed time moved.
        let second = cache
            .serve(61_000, || async {
                Ok(vec![dryer("D05", MachineStatus::Running, Some(120_000))])
            })
            .await;
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap());
        let resp = conditional_response(&headers, &second).unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(
            resp.headers().get(api::HDR_LAST_SUCCESS).unwrap(),
            "1970-01-01T00:01:01.000Z"
        );
    }

    #[tokio::test]
    async fn failed_refresh_still_revalidates_against_the_old_etag() {
        let cache: ResourceCache<Machine> =
            ResourceCache::new("machines", StalePolicy::new(45_000)).unwrap();

        let first = cache
            .serve(1_000, || async {
                Ok(vec![dryer("D05", MachineStatus::Running, Some(60_000))])
            })
            .await;
        let etag = api::quote_etag(&first.fingerprint);

        let degraded = cache
            .serve(100_000, || async { Err(FetchError::Timeout) })
            .await;
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap());
        let resp = conditional_response(&headers, &degraded).unwrap();
        // Same content, so 304; the staleness header tells the truth.
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(resp.headers().get(api::HDR_DATA_STALE).unwrap(), "true");
    }
}
