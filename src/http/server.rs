//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the gateway and its ESI engine from configuration
//! - Create the Axum router with a catch-all proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve until shutdown, running the strip-session sweeper alongside
//!
//! # Design Decisions
//! - Every subsystem is built once at startup and shared via `Arc`
//! - Startup errors are fatal; nothing is lazily initialized per request

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::ProxyConfig;
use crate::esi::{
    EsiEngine, IncludeProcessor, MemberPartitioner, PartitionerRegistry, ProcessorRegistry,
};
use crate::http::client::UpstreamClient;
use crate::http::gateway::Gateway;
use crate::http::request::MakeRequestUuidV4;
use crate::http::side_request::SideRequestBuilder;
use crate::lifecycle::Shutdown;
use crate::routing::{BackendRouter, RouteError};
use crate::session::{PhpSessionStore, StripSessionRegistry};

/// Error assembling the server from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("invalid siteRoot '{url}': {source}")]
    SiteRoot {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid memberHeader '{0}'")]
    MemberHeader(String),
}

/// HTTP server for the ESI proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    gateway: Gateway,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let backends = Arc::new(BackendRouter::from_mappings(&config.backend_mappings)?);
        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);

        let site_root = Url::parse(&config.esi.site_root).map_err(|source| StartupError::SiteRoot {
            url: config.esi.site_root.clone(),
            source,
        })?;
        let member_header = HeaderName::from_bytes(config.session.member_header.as_bytes())
            .map_err(|_| StartupError::MemberHeader(config.session.member_header.clone()))?;

        // Side-requests get their own client so their timeout is independent
        // of the primary request's.
        let side_client = Arc::new(UpstreamClient::new(
            connect_timeout,
            config.esi.side_request_timeout(),
            config.esi.max_body_bytes,
        ));
        let primary_client = Arc::new(UpstreamClient::new(
            connect_timeout,
            Duration::from_secs(config.timeouts.request_secs),
            config.esi.max_body_bytes,
        ));

        let store = Arc::new(PhpSessionStore::new(
            &config.session.php_session_dir,
            config.session.member_key.clone(),
        ));
        let mut partitioners = PartitionerRegistry::new();
        partitioners.register("member", Arc::new(MemberPartitioner::new(store, member_header)));

        let include = IncludeProcessor::new(
            Arc::new(SideRequestBuilder::new(backends.clone(), site_root)),
            side_client,
            Arc::new(partitioners),
        );
        let engine = Arc::new(EsiEngine::new(
            ProcessorRegistry::with_include(Arc::new(include)),
            config.esi.max_rounds,
            config.esi.resolution_timeout(),
        ));

        let registry = StripSessionRegistry::new(config.session.strip_session_ttl());
        let gateway = Gateway::new(backends.clone(), primary_client, engine, registry);

        tracing::info!(
            backends = backends.len(),
            max_rounds = config.esi.max_rounds,
            site_root = %config.esi.site_root,
            "Gateway initialized"
        );

        let router = Self::build_router(&config, gateway.clone());
        Ok(Self {
            router,
            config,
            gateway,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, gateway: Gateway) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(gateway)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = tokio::spawn(
            self.gateway
                .registry()
                .clone()
                .run_sweeper(self.config.session.sweep_interval(), shutdown.subscribe()),
        );

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        // The server can also stop on its own; make sure the sweeper follows.
        shutdown.trigger();
        let _ = sweeper.await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all proxy handler.
async fn proxy_handler(State(gateway): State<Gateway>, request: Request<Body>) -> Response {
    gateway.handle(request).await
}
