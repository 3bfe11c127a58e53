//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gateway, esi engine, client, strip-session registry
//!     → logging.rs (tracing events keyed by request_id)
//!     → metrics.rs (request, side-request and resolution counters)
//!
//! Exposed as:
//!     → stdout, pretty or JSON lines
//!     → Prometheus scrape endpoint when metricsEnabled
//! ```
//!
//! # Design Decisions
//! - The inbound x-request-id is copied onto every side-request, so a
//!   fragment's backend log lines join up with the page that included it
//! - `RUST_LOG` wins over the configured level

pub mod logging;
pub mod metrics;
