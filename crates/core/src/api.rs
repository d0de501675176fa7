//! Wire contract shared by the daemon and its display clients: freshness
//! headers, validator (ETag) formatting, and the batch detail DTOs.

use serde::{Deserialize, Serialize};

use crate::model::TxDetail;

/// Response header: "true" when the served snapshot is older than the
/// resource's staleness threshold.
pub const HDR_DATA_STALE: &str = "x-data-stale";

/// Response header: RFC 3339 time of the last successful upstream fetch,
/// empty when no fetch has ever succeeded.
pub const HDR_LAST_SUCCESS: &str = "x-last-success";

/// Request header: opaque display-client identifier, for request logs.
pub const HDR_CLIENT_ID: &str = "x-washboard-client";

/// Strong validator formatting; fingerprints travel quoted on the wire.
pub fn quote_etag(fingerprint: &str) -> String {
    format!("\"{fingerprint}\"")
}

/// Strip one layer of quotes and any `W/` weak-validator prefix.
fn unquote(tag: &str) -> &str {
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(tag)
}

/// True when an `If-None-Match` header value matches the current fingerprint.
///
/// Accepts a comma-separated candidate list, optional `W/` prefixes and
/// quoting, and the `*` wildcard. Fingerprint comparison is byte-exact;
/// there is no weak matching beyond ignoring the prefix.
pub fn if_none_match_matches(header: &str, fingerprint: &str) -> bool {
    header.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || unquote(candidate) == fingerprint
    })
}

/// Body of `POST /v1/transactions/details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailsRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Response of `POST /v1/transactions/details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailsResponse {
    pub details: Vec<TxDetail>,
}
