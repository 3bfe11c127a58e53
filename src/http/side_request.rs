//! ESI side-request construction.
//!
//! # Responsibilities
//! - Normalize directive `src` values (protocol-relative, relative, absolute)
//! - Route the resulting URL and rewrite it onto the backend
//! - Copy header state from the originating request
//!
//! # Design Decisions
//! - Side-requests are always GET over HTTP/1.1
//! - Header values are copied, never invented; hop-by-hop, Host, body
//!   framing and Accept-Encoding are dropped so fragments come back scannable

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, Version};
use url::Url;

use crate::http::client::SideRequestError;
use crate::http::headers::strip_hop_by_hop;
use crate::http::request::OriginRequest;
use crate::routing::BackendRouter;

/// A fully-formed outbound request for one directive.
#[derive(Debug, Clone)]
pub struct SideRequest {
    pub method: Method,
    /// Absolute URL, already rewritten onto the routed backend.
    pub url: Url,
    pub headers: HeaderMap,
}

impl SideRequest {
    /// Convert into a request the HTTP client can send.
    pub fn into_http(self) -> Result<Request<Body>, SideRequestError> {
        let mut builder = Request::builder()
            .method(self.method)
            .uri(self.url.as_str())
            .version(Version::HTTP_11);

        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }

        Ok(builder.body(Body::empty())?)
    }
}

/// Builds side-requests from an originating request.
#[derive(Debug, Clone)]
pub struct SideRequestBuilder {
    router: Arc<BackendRouter>,
    site_root: Url,
}

impl SideRequestBuilder {
    pub fn new(router: Arc<BackendRouter>, site_root: Url) -> Self {
        Self { router, site_root }
    }

    /// Build a side-request for `src`, or for the originating resource itself
    /// when `src` is `None`.
    pub fn build(
        &self,
        origin: &OriginRequest,
        src: Option<&str>,
    ) -> Result<SideRequest, SideRequestError> {
        let mut url = match src {
            None => origin.url.clone(),
            Some(src) => normalize_src(src, &self.site_root)?,
        };

        self.router.rewrite(&mut url)?;

        let mut headers = origin.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::ACCEPT_ENCODING);

        Ok(SideRequest {
            method: Method::GET,
            url,
            headers,
        })
    }
}

/// Turn an HTML-sourced URL into an absolute one.
pub fn normalize_src(src: &str, site_root: &Url) -> Result<Url, SideRequestError> {
    let invalid = |source| SideRequestError::InvalidUrl {
        src: src.to_string(),
        source,
    };

    if src.starts_with("//") {
        return Url::parse(&format!("http:{}", src)).map_err(invalid);
    }

    match Url::parse(src) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => site_root.join(src).map_err(invalid),
        Err(e) => Err(invalid(e)),
    }
}
