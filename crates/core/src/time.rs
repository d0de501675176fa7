use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since UNIX epoch.
pub type EpochMs = i64;

/// Current unix epoch milliseconds.
pub fn now_ms() -> EpochMs {
    let dur = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    dur.as_millis() as i64
}

/// RFC 3339 rendering of an epoch-milliseconds stamp, UTC.
///
/// Out-of-range stamps render as the empty string, the same as "never".
pub fn rfc3339_ms(ts: EpochMs) -> String {
    match chrono::DateTime::from_timestamp_millis(ts) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => String::new(),
    }
}

/// Parse an RFC 3339 stamp back into epoch milliseconds.
pub fn parse_rfc3339_ms(s: &str) -> Option<EpochMs> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
