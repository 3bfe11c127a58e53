//! Side-request partitioning.
//!
//! # Responsibilities
//! - Derive caller identity from session state
//! - Stamp that identity onto a side-request so the backend can personalize
//!   the fragment while the outer page stays shared
//!
//! # Design Decisions
//! - The identity header is always removed first; clients cannot forge it
//! - Partitioners are looked up by lower-cased name

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::esi::processor::EsiError;
use crate::http::request::OriginRequest;
use crate::http::side_request::SideRequest;
use crate::session::SessionStore;

/// Session cookie written by the backend application.
pub const SESSION_COOKIE: &str = "PHPSESSID";

/// Strategy that adjusts a side-request based on who is asking.
#[async_trait]
pub trait Partitioner: Send + Sync + std::fmt::Debug {
    async fn partition(
        &self,
        origin: &OriginRequest,
        request: &mut SideRequest,
    ) -> Result<(), EsiError>;
}

/// Injects the logged-in member id as a request header.
#[derive(Debug)]
pub struct MemberPartitioner {
    store: Arc<dyn SessionStore>,
    header: HeaderName,
}

impl MemberPartitioner {
    pub fn new(store: Arc<dyn SessionStore>, header: HeaderName) -> Self {
        Self { store, header }
    }
}

#[async_trait]
impl Partitioner for MemberPartitioner {
    async fn partition(
        &self,
        origin: &OriginRequest,
        request: &mut SideRequest,
    ) -> Result<(), EsiError> {
        request.headers.remove(&self.header);

        let Some(session_id) = cookie_value(&origin.headers, SESSION_COOKIE) else {
            return Ok(());
        };

        if let Some(member) = self.store.lookup(&session_id).await? {
            tracing::trace!(
                request_id = %origin.request_id,
                member,
                "Partitioning side-request by member"
            );
            request
                .headers
                .insert(self.header.clone(), HeaderValue::from(member));
        }

        Ok(())
    }
}

/// Name-keyed partitioner lookup.
#[derive(Debug, Default, Clone)]
pub struct PartitionerRegistry {
    partitioners: HashMap<String, Arc<dyn Partitioner>>,
}

impl PartitionerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, partitioner: Arc<dyn Partitioner>) {
        self.partitioners
            .insert(name.to_ascii_lowercase(), partitioner);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Partitioner>> {
        self.partitioners.get(&name.to_ascii_lowercase()).cloned()
    }
}

/// First value of cookie `name` across every `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
