//! Session-strip registry.
//!
//! Remembers which URLs a backend declared cacheable without session state
//! (`Cache-Control: strip-session`). Requests for those URLs have their
//! `Cookie` header removed before proxying.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::observability::metrics;

/// Thread-safe set of URLs marked for cookie stripping, with TTL eviction.
#[derive(Debug, Clone)]
pub struct StripSessionRegistry {
    /// URL → time of the last response that marked it.
    inner: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl StripSessionRegistry {
    /// Create an empty registry whose marks expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Mark a URL, refreshing its timestamp if already present.
    pub fn mark(&self, url: &str) {
        let fresh = self.inner.insert(url.to_string(), Instant::now()).is_none();
        if fresh {
            tracing::info!(url = %url, "URL marked for session stripping");
        }
        metrics::record_strip_session_urls(self.inner.len());
    }

    /// True if cookies should be stripped for this URL.
    pub fn should_strip(&self, url: &str) -> bool {
        self.inner
            .get(url)
            .map(|marked| marked.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    /// Drop every expired mark. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        let ttl = self.ttl;
        self.inner.retain(|_, marked| marked.elapsed() < ttl);
        let removed = before.saturating_sub(self.inner.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.inner.len(), "Evicted expired strip-session marks");
            metrics::record_strip_session_urls(self.inner.len());
        }
        removed
    }

    /// Number of marks currently held, expired or not.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Periodically evict expired marks until shutdown.
    pub async fn run_sweeper(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.purge_expired();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Strip-session sweeper stopping");
                    break;
                }
            }
        }
    }
}
