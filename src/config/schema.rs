//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files. Keys
//! are camelCase so that the historical `backendMappings` document loads as-is.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Key in `backendMappings` used when the request host has no mapping.
pub const DEFAULT_BACKEND_KEY: &str = "default";

/// Root configuration for the ESI proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Host header → backend base URL, plus the `"default"` fallback.
    pub backend_mappings: HashMap<String, String>,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// ESI resolution settings.
    pub esi: EsiConfig,

    /// Session stripping and session store settings.
    pub session: SessionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8002").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8002".to_string(),
        }
    }
}

/// ESI resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EsiConfig {
    /// Base URL that scheme-less `src` values are resolved against.
    pub site_root: String,

    /// Maximum number of scan/fetch/substitute rounds per response.
    pub max_rounds: usize,

    /// Timeout for a single side-request, including draining its body.
    pub side_request_timeout_secs: u64,

    /// Wall-clock budget for resolving one response.
    pub resolution_timeout_secs: u64,

    /// Largest body (primary or fragment) that will be buffered.
    pub max_body_bytes: usize,
}

impl Default for EsiConfig {
    fn default() -> Self {
        Self {
            site_root: "http://localhost/".to_string(),
            max_rounds: 10,
            side_request_timeout_secs: 10,
            resolution_timeout_secs: 20,
            max_body_bytes: 8 * 1024 * 1024, // 8MB
        }
    }
}

impl EsiConfig {
    pub fn side_request_timeout(&self) -> Duration {
        Duration::from_secs(self.side_request_timeout_secs)
    }

    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_secs(self.resolution_timeout_secs)
    }
}

/// Session handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// How long a `strip-session` mark stays valid after the last response that set it.
    pub strip_session_ttl_secs: u64,

    /// Interval of the background sweep that evicts expired marks.
    pub sweep_interval_secs: u64,

    /// Directory holding PHP `sess_<id>` files.
    pub php_session_dir: String,

    /// Session key carrying the logged-in member id.
    pub member_key: String,

    /// Header injected on side-requests by the `member` partitioner.
    pub member_header: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strip_session_ttl_secs: 3600,
            sweep_interval_secs: 60,
            php_session_dir: "/var/tmp".to_string(),
            member_key: "loggedInAs".to_string(),
            member_header: "x-member-id".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn strip_session_ttl(&self) -> Duration {
        Duration::from_secs(self.strip_session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
