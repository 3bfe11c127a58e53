//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Host (request Host header, or the authority of a directive src)
//!     → router.rs (backend lookup, "default" fallback)
//!     → Return: backend base URL or NoBackend
//!
//! Used by BOTH the primary proxied request and every ESI side-request,
//! so the host mapping is applied uniformly.
//! ```
//!
//! # Design Decisions
//! - Backend map built once at startup, immutable at runtime
//! - Deterministic: same host always routes to the same backend

pub mod router;

pub use router::{authority_of, BackendRouter, RouteError};
