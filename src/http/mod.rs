//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → gateway.rs (strip-session check, route, forward)
//!         → client.rs (primary request to backend)
//!     → [HTML?] esi engine
//!         → side_request.rs (build GET from origin + src)
//!         → client.rs (execute, drain body)
//!     → gateway.rs (Content-Length, strip-session mark)
//!     → Send to client
//! ```

pub mod client;
pub mod gateway;
pub mod headers;
pub mod request;
pub mod server;
pub mod side_request;

pub use client::{SideRequestError, SideResponse, UpstreamClient};
pub use gateway::Gateway;
pub use request::{OriginRequest, X_REQUEST_ID};
pub use server::{HttpServer, StartupError};
pub use side_request::{SideRequest, SideRequestBuilder};
