//! ESI resolving reverse proxy library.
//!
//! Proxies requests to backends chosen by Host, resolves `<esi:include>`
//! directives in HTML responses with concurrent side-requests, and strips
//! session cookies for URLs the backend marked `Cache-Control: strip-session`.

pub mod config;
pub mod esi;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod session;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
