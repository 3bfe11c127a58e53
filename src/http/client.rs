//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Send the primary proxied request to its backend
//! - Execute ESI side-requests and drain their bodies fully
//! - Enforce connect, request and body-size limits
//!
//! # Design Decisions
//! - One pooled hyper-util client shared by every request
//! - Side-request bodies are materialized, never streamed; nested directive
//!   scanning needs the complete bytes
//! - The response is consumed by the drain, so its connection is released on
//!   every exit path, including timeouts and errors

use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::side_request::SideRequest;
use crate::observability::metrics;
use crate::routing::RouteError;

/// Failure resolving one side-request.
#[derive(Debug, thiserror::Error)]
pub enum SideRequestError {
    #[error("invalid src '{src}': {source}")]
    InvalidUrl {
        src: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("failed to build request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read upstream body: {0}")]
    Body(#[from] axum::Error),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

/// A side-request response with its body fully read.
#[derive(Debug, Clone)]
pub struct SideResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// HTTP client for backend traffic.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    max_body_bytes: usize,
}

impl UpstreamClient {
    /// Create a client with the given connect and per-request timeouts.
    pub fn new(connect_timeout: Duration, timeout: Duration, max_body_bytes: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            timeout,
            max_body_bytes,
        }
    }

    /// Send a request and return the streaming response.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Incoming>, SideRequestError> {
        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SideRequestError::Timeout(self.timeout)),
        }
    }

    /// Read a response body completely, bounded by the body limit.
    pub async fn drain(&self, body: Incoming) -> Result<Bytes, SideRequestError> {
        Ok(axum::body::to_bytes(Body::new(body), self.max_body_bytes).await?)
    }

    /// Execute a side-request, draining its body within the request timeout.
    pub async fn execute(&self, request: SideRequest) -> Result<SideResponse, SideRequestError> {
        let start = Instant::now();
        let url = request.url.to_string();
        let request = request.into_http()?;

        let result = tokio::time::timeout(self.timeout, async {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes).await?;
            Ok::<_, SideRequestError>(SideResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        })
        .await
        .unwrap_or(Err(SideRequestError::Timeout(self.timeout)));

        match &result {
            Ok(response) => {
                tracing::debug!(
                    url = %url,
                    status = %response.status,
                    bytes = response.body.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Side-request completed"
                );
                metrics::record_side_request("ok", start);
            }
            Err(SideRequestError::Timeout(_)) => metrics::record_side_request("timeout", start),
            Err(_) => metrics::record_side_request("error", start),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn one_shot_backend(response: &'static str) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        addr
    }

    fn side_request(addr: std::net::SocketAddr) -> SideRequest {
        SideRequest {
            method: Method::GET,
            url: url::Url::parse(&format!("http://{}/frag", addr)).unwrap(),
            headers: HeaderMap::new(),
        }
    }

    #[tokio::test]
    async fn execute_drains_body() {
        let addr = one_shot_backend(
            "HTTP/1.1 200 OK\r\nContent-Length: 8\r\nConnection: close\r\n\r\n<b>Z</b>",
        )
        .await;
        let client = UpstreamClient::new(Duration::from_secs(1), Duration::from_secs(2), 1024);

        let response = client.execute(side_request(addr)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"<b>Z</b>");
    }

    #[tokio::test]
    async fn execute_enforces_body_limit() {
        let addr = one_shot_backend(
            "HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\n0123456789",
        )
        .await;
        let client = UpstreamClient::new(Duration::from_secs(1), Duration::from_secs(2), 4);

        let result = client.execute(side_request(addr)).await;
        assert!(matches!(result, Err(SideRequestError::Body(_))));
    }

    #[tokio::test]
    async fn execute_reports_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = UpstreamClient::new(Duration::from_secs(1), Duration::from_secs(2), 1024);
        let result = client.execute(side_request(addr)).await;
        assert!(matches!(result, Err(SideRequestError::Transport(_))));
    }

    #[tokio::test]
    async fn execute_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = UpstreamClient::new(Duration::from_secs(1), Duration::from_millis(200), 1024);
        let result = client.execute(side_request(addr)).await;
        assert!(matches!(result, Err(SideRequestError::Timeout(_))));
    }
}
