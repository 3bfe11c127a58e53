//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON, or TOML by extension)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once at startup to build the router, client and engine
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend map is never mutated
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    EsiConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, SessionConfig, TimeoutConfig,
    DEFAULT_BACKEND_KEY,
};
pub use validation::ValidationError;
