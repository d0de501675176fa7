//! Jittered conditional polling of the daemon's machine snapshot.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use reqwest::{Client, Response, StatusCode};
use tokio::time::sleep;

use washboard_core::api;
use washboard_core::hysteresis::HysteresisFilter;
use washboard_core::jitter::PollWindow;
use washboard_core::model::Machine;
use washboard_core::snapshot::Snapshot;
use washboard_core::staleness::StalePolicy;
use washboard_core::time::{now_ms, parse_rfc3339_ms, EpochMs};

use crate::view;

/// Request timeout. Generous enough to sit through the daemon's own
/// upstream refresh on the stale path.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// 200: the daemon sent a (possibly changed) snapshot body.
    Changed {
        snapshot: Snapshot<Machine>,
        etag: Option<String>,
    },
    /// 304: content unchanged; headers may still re-grade freshness.
    NotModified {
        stale: bool,
        last_success_ms: Option<EpochMs>,
    },
    /// Network or protocol failure. Keep showing what we have.
    Failed(String),
}

/// The display's working copy of the machine grid.
///
/// Only a 200 body replaces `machines`. A 304 or a failed poll can move the
/// freshness indicator, never the data, so the display never regresses to
/// an older or emptier grid.
#[derive(Debug, Default)]
pub struct Working {
    pub machines: Vec<Machine>,
    pub etag: Option<String>,
    pub stale: bool,
    pub last_success_ms: Option<EpochMs>,
    /// True once any poll has returned a body.
    pub populated: bool,
}

impl Working {
    pub fn absorb(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Changed { snapshot, etag } => {
                self.machines = snapshot.items;
                self.stale = snapshot.meta.stale;
                self.last_success_ms = snapshot.meta.ts;
                self.etag = etag;
                self.populated = true;
            }
            PollOutcome::NotModified {
                stale,
                last_success_ms,
            } => {
                self.stale = stale;
                // A proxy may strip the x- headers; keep the old stamp
                // rather than blanking the indicator.
                if last_success_ms.is_some() {
                    self.last_success_ms = last_success_ms;
                }
            }
            PollOutcome::Failed(_) => {
                self.stale = true;
            }
        }
    }
}

/// One conditional poll against `/v1/machines`. Failures come back as
/// [`PollOutcome::Failed`]; the loop never dies to a flaky network.
pub async fn poll_once(
    client: &Client,
    daemon_url: &str,
    client_id: &str,
    etag: Option<&str>,
) -> PollOutcome {
    match fetch(client, daemon_url, client_id, etag).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(error = %err, "poll failed");
            PollOutcome::Failed(err.to_string())
        }
    }
}

/// Build the conditional poll request. `Cache-Control: no-cache` makes any
/// intermediary revalidate instead of answering from its own copy, so the
/// 304 decision always belongs to the daemon.
fn conditional_get(
    client: &Client,
    daemon_url: &str,
    client_id: &str,
    etag: Option<&str>,
) -> reqwest::RequestBuilder {
    let mut req = client
        .get(format!("{daemon_url}/v1/machines"))
        .timeout(POLL_TIMEOUT)
        .header(reqwest::header::CACHE_CONTROL, "no-cache")
        .header(api::HDR_CLIENT_ID, client_id);
    if let Some(etag) = etag {
        req = req.header(reqwest::header::IF_NONE_MATCH, etag);
    }
    req
}

async fn fetch(
    client: &Client,
    daemon_url: &str,
    client_id: &str,
    etag: Option<&str>,
) -> Result<PollOutcome> {
    let resp = conditional_get(client, daemon_url, client_id, etag)
        .send()
        .await
        .context("machines request")?;

    match resp.status() {
        StatusCode::NOT_MODIFIED => Ok(PollOutcome::NotModified {
            stale: header_string(&resp, api::HDR_DATA_STALE).is_some_and(|v| v == "true"),
            last_success_ms: header_string(&resp, api::HDR_LAST_SUCCESS)
                .filter(|v| !v.is_empty())
                .and_then(|v| parse_rfc3339_ms(&v)),
        }),
        status if status.is_success() => {
            let etag = header_string(&resp, "etag");
            let snapshot = resp
                .json::<Snapshot<Machine>>()
                .await
                .context("machines decode")?;
            Ok(PollOutcome::Changed { snapshot, etag })
        }
        status => anyhow::bail!("machines returned {status}"),
    }
}

fn header_string(resp: &Response, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// The watch loop: poll, render, sleep a freshly drawn jittered delay,
/// repeat. Every cycle re-draws the delay so a fleet of displays stays
/// de-synchronized even after a shared outage.
pub async fn watch(daemon_url: &str, client_id: &str, window: PollWindow, once: bool) -> Result<()> {
    let client = Client::new();
    let mut rng = SmallRng::from_entropy();
    let mut working = Working::default();
    let mut filter = HysteresisFilter::default();
    let policy = StalePolicy::default();

    let outcome = poll_once(&client, daemon_url, client_id, working.etag.as_deref()).await;
    working.absorb(outcome);
    view::render(&mut filter, &working, &policy, now_ms());

    if once {
        return Ok(());
    }

    // On-site operators can SIGUSR1 for an immediate poll, or resize the
    // terminal (SIGWINCH) for a redraw with no network traffic.
    #[cfg(unix)]
    let mut poke = unix_signal(tokio::signal::unix::SignalKind::user_defined1())?;
    #[cfg(unix)]
    let mut resize = unix_signal(tokio::signal::unix::SignalKind::window_change())?;

    loop {
        let delay = window.next_delay(&mut rng);
        tracing::debug!(delay_ms = delay.as_millis() as u64, "next poll scheduled");

        #[cfg(unix)]
        {
            tokio::select! {
                _ = sleep(delay) => {}
                _ = poke.recv() => tracing::info!("immediate poll requested"),
                _ = resize.recv() => {
                    view::render(&mut filter, &working, &policy, now_ms());
                    continue;
                }
            }
        }
        #[cfg(not(unix))]
        sleep(delay).await;

        let outcome = poll_once(&client, daemon_url, client_id, working.etag.as_deref()).await;
        working.absorb(outcome);
        view::render(&mut filter, &working, &policy, now_ms());
    }
}

#[cfg(unix)]
fn unix_signal(kind: tokio::signal::unix::SignalKind) -> Result<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(kind).context("install signal handler")
}

#[cfg(test)]
mod tests {
    use super::*;
    use washboard_core::model::{MachineKind, MachineStatus};

    fn machine(id: &str, status: MachineStatus) -> Machine {
        Machine {
            id: id.to_string(),
            kind: MachineKind::Washer,
            label: format!("Washer {id}"),
            slot: id.to_string(),
            status,
            elapsed_ms: None,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn body_response_replaces_the_working_copy() {
        let mut w = Working::default();
        w.absorb(PollOutcome::Changed {
            snapshot: Snapshot::captured(vec![machine("W01", MachineStatus::Ready)], 1_000, false),
            etag: Some("\"abc\"".into()),
        });
        assert!(w.populated);
        assert_eq!(w.machines.len(), 1);
        assert_eq!(w.etag.as_deref(), Some("\"abc\""));
        assert!(!w.stale);
        assert_eq!(w.last_success_ms, Some(1_000));
    }

    #[test]
    fn not_modified_regrades_without_touching_data() {
        let mut w = Working::default();
        w.absorb(PollOutcome::Changed {
            snapshot: Snapshot::captured(vec![machine("W01", MachineStatus::Ready)], 1_000, false),
            etag: Some("\"abc\"".into()),
        });
        w.absorb(PollOutcome::NotModified {
            stale: true,
            last_success_ms: Some(2_000),
        });
        assert_eq!(w.machines.len(), 1);
        assert_eq!(w.etag.as_deref(), Some("\"abc\""));
        assert!(w.stale);
        assert_eq!(w.last_success_ms, Some(2_000));
    }

    #[test]
    fn not_modified_without_headers_keeps_the_old_stamp() {
        let mut w = Working::default();
        w.absorb(PollOutcome::Changed {
            snapshot: Snapshot::captured(vec![machine("W01", MachineStatus::Ready)], 1_000, false),
            etag: None,
        });
        w.absorb(PollOutcome::NotModified {
            stale: false,
            last_success_ms: None,
        });
        assert_eq!(w.last_success_ms, Some(1_000));
    }

    #[test]
    fn failure_marks_stale_and_never_regresses() {
        let mut w = Working::default();
        w.absorb(PollOutcome::Changed {
            snapshot: Snapshot::captured(
                vec![
                    machine("W01", MachineStatus::Ready),
                    machine("W02", MachineStatus::Running),
                ],
                1_000,
                false,
            ),
            etag: Some("\"abc\"".into()),
        });
        w.absorb(PollOutcome::Failed("connection refused".into()));
        assert!(w.stale);
        assert_eq!(w.machines.len(), 2);
        assert_eq!(w.etag.as_deref(), Some("\"abc\""));
        assert_eq!(w.last_success_ms, Some(1_000));

        // Recovery with a 304: same validator still matches.
        w.absorb(PollOutcome::NotModified {
            stale: false,
            last_success_ms: Some(90_000),
        });
        assert!(!w.stale);
        assert_eq!(w.machines.len(), 2);
    }

    #[test]
    fn poll_requests_carry_the_protocol_headers() {
        let client = Client::new();
        let req = conditional_get(&client, "http://127.0.0.1:9188", "kiosk-1", Some("\"abc\""))
            .build()
            .unwrap();
        assert!(req.url().path().ends_with("/v1/machines"));
        let headers = req.headers();
        assert_eq!(
            headers.get(reqwest::header::CACHE_CONTROL).unwrap(),
            "no-cache"
        );
        assert_eq!(headers.get(api::HDR_CLIENT_ID).unwrap(), "kiosk-1");
        assert_eq!(
            headers.get(reqwest::header::IF_NONE_MATCH).unwrap(),
            "\"abc\""
        );

        // First poll has no validator yet, but still bypasses intermediaries.
        let req = conditional_get(&client, "http://127.0.0.1:9188", "kiosk-1", None)
            .build()
            .unwrap();
        assert!(req.headers().get(reqwest::header::IF_NONE_MATCH).is_none());
        assert_eq!(
            req.headers().get(reqwest::header::CACHE_CONTROL).unwrap(),
            "no-cache"
        );
    }
}
