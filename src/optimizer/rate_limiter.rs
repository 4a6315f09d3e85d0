//! Cooperative rate limiting driven by quota snapshots.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::AppResult;
use crate::util::clock::now_ms;

/// Remaining quota for one resource, as reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Window reset, ms since epoch.
    pub reset_at_ms: u64,
    /// Requests consumed in the current window.
    pub used: u64,
}

impl RateLimitSnapshot {
    /// How long a caller must wait at `now_ms`, given a safety `buffer`.
    ///
    /// Zero when quota remains above the buffer or the reset already passed.
    #[must_use]
    pub const fn required_wait(&self, buffer: u64, now_ms: u64) -> Duration {
        if self.remaining > buffer {
            return Duration::ZERO;
        }
        Duration::from_millis(self.reset_at_ms.saturating_sub(now_ms))
    }
}

/// Upstream quota introspection for one resource.
#[async_trait]
pub trait QuotaSource: Send + Sync {
    /// Fetch the current quota.
    async fn fetch_quota(&self) -> AppResult<RateLimitSnapshot>;
}

/// Delays calls while a resource's quota is at or below the buffer.
///
/// This is cooperative: only callers going through [`RateLimiter::with_rate_limit`]
/// are throttled, and concurrent callers may all pass a stale snapshot.
pub struct RateLimiter {
    buffer: u64,
    sources: RwLock<HashMap<String, Arc<dyn QuotaSource>>>,
    snapshots: RwLock<HashMap<String, RateLimitSnapshot>>,
}

impl RateLimiter {
    /// Create a limiter that waits once `remaining <= buffer`.
    #[must_use]
    pub fn new(buffer: u64) -> Self {
        Self {
            buffer,
            sources: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Register the quota source consulted after each call to `resource`.
    pub fn register_source(&self, resource: impl Into<String>, source: Arc<dyn QuotaSource>) {
        self.sources.write().insert(resource.into(), source);
    }

    /// Store a snapshot obtained elsewhere, e.g. from response headers.
    pub fn record_snapshot(&self, resource: impl Into<String>, snapshot: RateLimitSnapshot) {
        self.snapshots.write().insert(resource.into(), snapshot);
    }

    /// Last known snapshot for `resource`.
    #[must_use]
    pub fn snapshot(&self, resource: &str) -> Option<RateLimitSnapshot> {
        self.snapshots.read().get(resource).copied()
    }

    /// All known snapshots.
    #[must_use]
    pub fn snapshots(&self) -> HashMap<String, RateLimitSnapshot> {
        self.snapshots.read().clone()
    }

    /// Configured safety buffer.
    #[must_use]
    pub const fn buffer(&self) -> u64 {
        self.buffer
    }

    /// Run `f` against `resource`, waiting for the reset first if quota is low.
    ///
    /// Without a snapshot the call goes through immediately. After `f`
    /// settles, the snapshot is refreshed from the registered source.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `f`. Refresh failures are logged only.
    pub async fn with_rate_limit<F, Fut, T, E>(&self, resource: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.wait_for_quota(resource).await;
        let result = f().await;
        self.refresh(resource).await;
        result
    }

    /// Sleep until the reset if the last snapshot is at or below the buffer.
    pub async fn wait_for_quota(&self, resource: &str) {
        let Some(snapshot) = self.snapshot(resource) else {
            return;
        };
        let wait = snapshot.required_wait(self.buffer, now_ms());
        if wait.is_zero() {
            return;
        }
        info!(
            resource,
            remaining = snapshot.remaining,
            wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            "rate limit buffer reached, waiting for reset"
        );
        tokio::time::sleep(wait).await;
    }

    /// Refresh the snapshot from the registered source, keeping the old one on error.
    pub async fn refresh(&self, resource: &str) {
        let source = self.sources.read().get(resource).cloned();
        let Some(source) = source else {
            return;
        };
        match source.fetch_quota().await {
            Ok(snapshot) => {
                debug!(resource, remaining = snapshot.remaining, "quota refreshed");
                self.record_snapshot(resource, snapshot);
            }
            Err(e) => warn!(resource, error = %e, "failed to refresh quota"),
        }
    }
}
