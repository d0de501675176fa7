//! Last-known-good snapshot caches, one per upstream resource.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use washboard_core::fingerprint::{fingerprint, StableView};
use washboard_core::staleness::StalePolicy;
use washboard_core::time::EpochMs;

use crate::gateway::FetchError;

/// One successfully captured upstream state plus its precomputed validator.
struct Stored<T> {
    items: Arc<Vec<T>>,
    captured_at_ms: EpochMs,
    fingerprint: String,
}

// Not derived: a derive would bound `T: Clone`, which the `Arc` makes
// unnecessary.
impl<T> Clone for Stored<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            captured_at_ms: self.captured_at_ms,
            fingerprint: self.fingerprint.clone(),
        }
    }
}

/// Everything a handler needs to answer one conditional GET.
#[derive(Debug, Clone)]
pub struct Served<T> {
    pub items: Arc<Vec<T>>,
    pub fingerprint: String,
    pub stale: bool,
    pub last_success_ms: Option<EpochMs>,
}

/// Snapshot store + refresh coordinator for one resource type.
///
/// The slot holds the last successful capture and is replaced wholesale on
/// refresh; readers clone `Arc`s out and no lock guard lives across an
/// await. The `refresh` mutex is the single-flight guard: it IS held across
/// the upstream fetch, so under a stampede exactly one caller fetches and
/// the rest serve its result.
///
/// A failed refresh keeps the previous capture and only flips staleness; a
/// resource that has never succeeded serves an empty placeholder. Refreshes
/// are pull-based: nothing happens between requests.
pub struct ResourceCache<T> {
    name: &'static str,
    policy: StalePolicy,
    slot: RwLock<Option<Stored<T>>>,
    refresh: Mutex<()>,
    empty_fingerprint: String,
}

impl<T: StableView> ResourceCache<T> {
    pub fn new(name: &'static str, policy: StalePolicy) -> anyhow::Result<Self> {
        Ok(Self {
            name,
            policy,
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
            empty_fingerprint: fingerprint::<T>(&[])?,
        })
    }

    /// Serve the resource as of `now`, refreshing first if the snapshot is
    /// stale. Never returns an error: upstream failure degrades to the
    /// previous capture (or the empty placeholder) with `stale = true`.
    pub async fn serve<F, Fut>(&self, now: EpochMs, fetch: F) -> Served<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, FetchError>>,
    {
        if let Some(served) = self.if_fresh(now).await {
            return served;
        }

        let _flight = self.refresh.lock().await;

        // Whoever held the guard before us may have refreshed the slot.
        if let Some(served) = self.if_fresh(now).await {
            return served;
        }

        tracing::debug!(resource = self.name, "refreshing stale snapshot");
        match fetch().await {
            Ok(items) => match self.store(items, now).await {
                Ok(served) => served,
                Err(err) => {
                    tracing::warn!(resource = self.name, error = %err, "fingerprint failed, serving previous snapshot");
                    self.fallback().await
                }
            },
            Err(err) => {
                tracing::warn!(resource = self.name, error = %err, "refresh failed, serving previous snapshot");
                self.fallback().await
            }
        }
    }

    async fn if_fresh(&self, now: EpochMs) -> Option<Served<T>> {
        let slot = self.slot.read().await;
        let stored = slot.as_ref()?;
        if self.policy.is_stale(now, Some(stored.captured_at_ms)) {
            return None;
        }
        Some(Served {
            items: Arc::clone(&stored.items),
            fingerprint: stored.fingerprint.clone(),
            stale: false,
            last_success_ms: Some(stored.captured_at_ms),
        })
    }

    async fn store(&self, items: Vec<T>, now: EpochMs) -> anyhow::Result<Served<T>> {
        let stored = Stored {
            fingerprint: fingerprint(&items)?,
            items: Arc::new(items),
            captured_at_ms: now,
        };
        *self.slot.write().await = Some(stored.clone());
        Ok(Served {
            items: stored.items,
            fingerprint: stored.fingerprint,
            stale: false,
            last_success_ms: Some(stored.captured_at_ms),
        })
    }

    /// Serve whatever we have, marked stale. With no prior success this is
    /// the empty placeholder, which still carries a real fingerprint.
    async fn fallback(&self) -> Served<T> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some(stored) => Served {
                items: Arc::clone(&stored.items),
                fingerprint: stored.fingerprint.clone(),
                stale: true,
                last_success_ms: Some(stored.captured_at_ms),
            },
            None => Served {
                items: Arc::new(Vec::new()),
                fingerprint: self.empty_fingerprint.clone(),
                stale: true,
                last_success_ms: None,
            },
        }
    }
}
