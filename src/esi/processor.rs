//! Directive processors.
//!
//! # Responsibilities
//! - Turn one parsed directive into the bytes that replace it
//! - Select the processor named by the directive's `processor` attribute
//!
//! # Design Decisions
//! - `include` is the default; `replace` is accepted as an alias so markup
//!   written for the older attribute value keeps working
//! - A side-request's body is spliced regardless of its status code; backends
//!   render their own error fragments

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::esi::directive::Directive;
use crate::esi::partitioner::PartitionerRegistry;
use crate::http::client::{SideRequestError, UpstreamClient};
use crate::http::request::OriginRequest;
use crate::http::side_request::SideRequestBuilder;
use crate::session::SessionError;

/// Name of the processor used when a directive does not name one.
pub const DEFAULT_PROCESSOR: &str = "include";

/// Failure resolving a single directive occurrence.
#[derive(Debug, thiserror::Error)]
pub enum EsiError {
    #[error(transparent)]
    SideRequest(#[from] SideRequestError),

    #[error("unknown processor '{0}'")]
    UnknownProcessor(String),

    #[error("unknown partitioner '{0}'")]
    UnknownPartitioner(String),

    #[error("session lookup failed: {0}")]
    Session(#[from] SessionError),
}

/// Resolves a directive to its replacement content.
#[async_trait]
pub trait Processor: Send + Sync + std::fmt::Debug {
    async fn process(&self, origin: &OriginRequest, directive: &Directive)
        -> Result<Bytes, EsiError>;
}

/// Fetches `src` with a side-request and returns the response body.
#[derive(Debug, Clone)]
pub struct IncludeProcessor {
    builder: Arc<SideRequestBuilder>,
    client: Arc<UpstreamClient>,
    partitioners: Arc<PartitionerRegistry>,
}

impl IncludeProcessor {
    pub fn new(
        builder: Arc<SideRequestBuilder>,
        client: Arc<UpstreamClient>,
        partitioners: Arc<PartitionerRegistry>,
    ) -> Self {
        Self {
            builder,
            client,
            partitioners,
        }
    }
}

#[async_trait]
impl Processor for IncludeProcessor {
    async fn process(
        &self,
        origin: &OriginRequest,
        directive: &Directive,
    ) -> Result<Bytes, EsiError> {
        let mut request = self.builder.build(origin, Some(&directive.src))?;

        if let Some(name) = directive.partitioner.as_deref() {
            let partitioner = self
                .partitioners
                .get(name)
                .ok_or_else(|| EsiError::UnknownPartitioner(name.to_string()))?;
            partitioner.partition(origin, &mut request).await?;
        }

        let response = self.client.execute(request).await?;
        if !response.status.is_success() {
            tracing::debug!(
                request_id = %origin.request_id,
                src = %directive.src,
                status = %response.status,
                "Side-request returned non-success status"
            );
        }

        Ok(response.body)
    }
}

/// Name-keyed processor lookup.
#[derive(Debug, Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `processor` serving both `include` and `replace`.
    pub fn with_include(processor: Arc<dyn Processor>) -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_PROCESSOR, processor.clone());
        registry.register("replace", processor);
        registry
    }

    pub fn register(&mut self, name: &str, processor: Arc<dyn Processor>) {
        self.processors.insert(name.to_ascii_lowercase(), processor);
    }

    /// Look up a processor; `None` selects the default.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn Processor>, EsiError> {
        let name = name.unwrap_or(DEFAULT_PROCESSOR);
        self.processors
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| EsiError::UnknownProcessor(name.to_string()))
    }
}
