//! Shared resolution buffer.
//!
//! The in-progress response body for one resolution pass. Scans take the
//! read lock; substitutions take the write lock. Neither is ever held across
//! network I/O.

use std::collections::HashMap;

use axum::body::Bytes;
use tokio::sync::RwLock;

use crate::esi::directive::{find_directives, substitute};

/// Body bytes behind a reader/writer lock.
#[derive(Debug, Default)]
pub struct DirectiveBuffer {
    inner: RwLock<Vec<u8>>,
}

impl DirectiveBuffer {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: RwLock::new(body.into()),
        }
    }

    /// Distinct directive occurrences currently in the buffer.
    pub async fn scan(&self) -> Vec<Bytes> {
        let body = self.inner.read().await;
        find_directives(&body)
    }

    /// Apply one round of resolutions. Returns the number of occurrences replaced.
    pub async fn substitute(&self, resolved: &HashMap<Bytes, Bytes>) -> usize {
        let mut body = self.inner.write().await;
        let (updated, replaced) = substitute(&body, resolved);
        *body = updated;
        replaced
    }

    /// Consume the buffer, returning its final contents.
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.inner.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn scan_then_substitute() {
        let buffer = DirectiveBuffer::new(&br#"<p><esi:include src="/a"/></p>"#[..]);
        let found = buffer.scan().await;
        assert_eq!(found.len(), 1);

        let mut resolved = HashMap::new();
        resolved.insert(found[0].clone(), Bytes::from_static(b"hello"));
        assert_eq!(buffer.substitute(&resolved).await, 1);

        assert!(buffer.scan().await.is_empty());
        assert_eq!(buffer.into_bytes(), Bytes::from_static(b"<p>hello</p>"));
    }

    #[tokio::test]
    async fn substitution_order_does_not_matter() {
        async fn resolve_in(order: &[usize]) -> Bytes {
            let body = br#"<esi:include src="/a"/>-<esi:include src="/b"/>-<esi:include src="/c"/>"#;
            let parts = [("/a", "A"), ("/b", "BB"), ("/c", "")];

            let buffer = DirectiveBuffer::new(&body[..]);
            for &i in order {
                let (src, value) = parts[i];
                let mut resolved = HashMap::new();
                resolved.insert(
                    Bytes::from(format!(r#"<esi:include src="{}"/>"#, src)),
                    Bytes::from(value),
                );
                buffer.substitute(&resolved).await;
            }
            buffer.into_bytes()
        }

        let forward = resolve_in(&[0, 1, 2]).await;
        let backward = resolve_in(&[2, 1, 0]).await;
        assert_eq!(forward, backward);
        assert_eq!(forward, Bytes::from_static(b"A-BB-"));
    }

    #[tokio::test]
    async fn concurrent_scans_share_the_lock() {
        let buffer = Arc::new(DirectiveBuffer::new(&br#"<esi:include src="/a"/>"#[..]));
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let buffer = buffer.clone();
            tasks.spawn(async move { buffer.scan().await.len() });
        }
        while let Some(found) = tasks.join_next().await {
            assert_eq!(found.unwrap(), 1);
        }
        assert_eq!(buffer.scan().await.len(), 1);
    }
}
