//! Primary proxy path and response assembly.
//!
//! # Responsibilities
//! - Strip cookies for URLs marked by a previous `strip-session` response
//! - Route and forward the inbound request to its backend
//! - Capture HTML responses and resolve their ESI directives
//! - Write status, headers and body once, with a recomputed Content-Length
//! - Record `strip-session` hints for later requests
//!
//! # Design Decisions
//! - Only routing, primary transport and malformed-Host failures produce error
//!   statuses; directive failures degrade to an inline marker
//! - Non-HTML bodies are streamed through without buffering
//! - HEAD on an HTML page is not resolved, so it carries no Content-Length
//! - The inbound Host is forwarded so backends can still vhost on it

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, StatusCode, Version},
    response::{IntoResponse, Response},
};

use crate::esi::{EsiEngine, ResolutionOutcome};
use crate::http::client::UpstreamClient;
use crate::http::headers::{has_strip_session, is_scannable, strip_hop_by_hop};
use crate::http::request::OriginRequest;
use crate::observability::metrics;
use crate::routing::BackendRouter;
use crate::session::StripSessionRegistry;

/// Everything a request needs to be proxied and resolved.
#[derive(Debug, Clone)]
pub struct Gateway {
    router: Arc<BackendRouter>,
    client: Arc<UpstreamClient>,
    engine: Arc<EsiEngine>,
    registry: StripSessionRegistry,
}

impl Gateway {
    pub fn new(
        router: Arc<BackendRouter>,
        client: Arc<UpstreamClient>,
        engine: Arc<EsiEngine>,
        registry: StripSessionRegistry,
    ) -> Self {
        Self {
            router,
            client,
            engine,
            registry,
        }
    }

    pub fn registry(&self) -> &StripSessionRegistry {
        &self.registry
    }

    /// Proxy one inbound request and assemble its response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let (mut parts, body) = request.into_parts();
        let method = parts.method.clone();

        let mut origin = match OriginRequest::from_parts(&parts) {
            Ok(origin) => origin,
            Err(e) => {
                tracing::warn!(error = %e, uri = %parts.uri, "Rejecting request");
                metrics::record_request(method.as_str(), 400, start);
                return (StatusCode::BAD_REQUEST, "Invalid Host").into_response();
            }
        };

        if self.registry.should_strip(origin.key()) {
            tracing::debug!(
                request_id = %origin.request_id,
                url = %origin.url,
                "Stripping session cookies"
            );
            parts.headers.remove(header::COOKIE);
            origin.headers.remove(header::COOKIE);
        }
        let origin = Arc::new(origin);

        tracing::debug!(
            request_id = %origin.request_id,
            method = %method,
            url = %origin.url,
            "Proxying request"
        );

        let mut upstream_url = origin.url.clone();
        if let Err(e) = self.router.rewrite(&mut upstream_url) {
            tracing::warn!(request_id = %origin.request_id, error = %e, "No route for request");
            metrics::record_request(method.as_str(), 502, start);
            return (StatusCode::BAD_GATEWAY, "No backend mapping for host").into_response();
        }

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::ACCEPT_ENCODING);

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(upstream_url.as_str())
            .version(Version::HTTP_11);
        if let Some(h) = builder.headers_mut() {
            *h = headers;
        }
        let upstream_request = match builder.body(body) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(request_id = %origin.request_id, error = %e, "Failed to build upstream request");
                metrics::record_request(method.as_str(), 500, start);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build upstream request")
                    .into_response();
            }
        };

        let response = match self.client.send(upstream_request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    request_id = %origin.request_id,
                    backend = %upstream_url,
                    error = %e,
                    "Upstream error"
                );
                metrics::record_request(method.as_str(), 502, start);
                return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
            }
        };

        let (mut parts, incoming) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        let mark = has_strip_session(&parts.headers);

        let response = if is_scannable(&method, &parts.headers) {
            let captured = match self.client.drain(incoming).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(
                        request_id = %origin.request_id,
                        error = %e,
                        "Failed to capture upstream body"
                    );
                    metrics::record_request(method.as_str(), 502, start);
                    return (StatusCode::BAD_GATEWAY, "Upstream body unavailable").into_response();
                }
            };

            let resolution = self.engine.resolve(origin.clone(), captured).await;
            if resolution.outcome == ResolutionOutcome::Complete && resolution.rounds > 0 {
                tracing::debug!(
                    request_id = %origin.request_id,
                    rounds = resolution.rounds,
                    "ESI resolution complete"
                );
            }

            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(resolution.body.len()));
            Response::from_parts(parts, Body::from(resolution.body))
        } else {
            if method == Method::HEAD && is_scannable(&Method::GET, &parts.headers) {
                // The backend's length describes the unresolved template.
                parts.headers.remove(header::CONTENT_LENGTH);
            }
            Response::from_parts(parts, Body::new(incoming))
        };

        if mark {
            self.registry.mark(origin.key());
        }

        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        response
    }
}
