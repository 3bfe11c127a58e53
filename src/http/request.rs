//! Request identity and the originating-request snapshot.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Capture the inbound URL and headers that side-requests derive from
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The snapshot is taken after session stripping, so side-requests never
//!   see a cookie the primary request did not carry

use axum::http::{header, request::Parts, HeaderMap, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;

/// Name of the request ID header.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

/// Read the request ID set by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Immutable view of the inbound request that ESI side-requests are built from.
#[derive(Debug, Clone)]
pub struct OriginRequest {
    /// Absolute URL as the client addressed it (`http://{Host}{path?query}`).
    pub url: Url,
    /// Inbound headers, after session stripping.
    pub headers: HeaderMap,
    pub request_id: String,
}

/// Error building an [`OriginRequest`].
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("request has no Host")]
    MissingHost,

    #[error("request URL is invalid: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl OriginRequest {
    /// Snapshot the inbound request parts.
    pub fn from_parts(parts: &Parts) -> Result<Self, OriginError> {
        let url = origin_url(parts)?;
        Ok(Self {
            url,
            headers: parts.headers.clone(),
            request_id: request_id(&parts.headers),
        })
    }

    /// The exact URL string used as the session-strip key.
    pub fn key(&self) -> &str {
        self.url.as_str()
    }
}

/// Reconstruct the absolute URL of an inbound request.
pub fn origin_url(parts: &Parts) -> Result<Url, OriginError> {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .filter(|h| !h.is_empty())
        .ok_or(OriginError::MissingHost)?;

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Ok(Url::parse(&format!("http://{}{}", host, path))?)
}
