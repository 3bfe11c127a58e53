//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Backend base URLs are plain `http` URLs with a host
//! - Validate value ranges (timeouts > 0, round cap > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{ProxyConfig, DEFAULT_BACKEND_KEY};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("backend mapping for '{host}' is not a valid URL: {url}")]
    InvalidBackendUrl { host: String, url: String },

    #[error("backend mapping for '{host}' must use http, got '{scheme}'")]
    UnsupportedScheme { host: String, scheme: String },

    #[error("no backend mappings configured")]
    NoBackends,

    #[error("esi.siteRoot is not an absolute URL: {0}")]
    InvalidSiteRoot(String),

    #[error("listener.bindAddress is not a socket address: {0}")]
    InvalidBindAddress(String),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backend_mappings.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    for (host, url) in &config.backend_mappings {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() != "http" => {
                errors.push(ValidationError::UnsupportedScheme {
                    host: host.clone(),
                    scheme: parsed.scheme().to_string(),
                });
            }
            Ok(parsed) if parsed.host_str().is_none() => {
                errors.push(ValidationError::InvalidBackendUrl {
                    host: host.clone(),
                    url: url.clone(),
                });
            }
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::InvalidBackendUrl {
                host: host.clone(),
                url: url.clone(),
            }),
        }
    }

    if !config.backend_mappings.contains_key(DEFAULT_BACKEND_KEY) {
        tracing::warn!("No 'default' backend mapping; unmapped hosts will receive 502");
    }

    if Url::parse(&config.esi.site_root).is_err() {
        errors.push(ValidationError::InvalidSiteRoot(config.esi.site_root.clone()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let positives = [
        ("esi.maxRounds", config.esi.max_rounds as u64),
        ("esi.sideRequestTimeoutSecs", config.esi.side_request_timeout_secs),
        ("esi.resolutionTimeoutSecs", config.esi.resolution_timeout_secs),
        ("esi.maxBodyBytes", config.esi.max_body_bytes as u64),
        ("session.stripSessionTtlSecs", config.session.strip_session_ttl_secs),
        ("session.sweepIntervalSecs", config.session.sweep_interval_secs),
        ("timeouts.connectSecs", config.timeouts.connect_secs),
        ("timeouts.requestSecs", config.timeouts.request_secs),
    ];
    for (name, value) in positives {
        if value == 0 {
            errors.push(ValidationError::NotPositive(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config
            .backend_mappings
            .insert("default".into(), "http://127.0.0.1:8001/".into());
        config
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn reports_all_errors() {
        let mut config = valid_config();
        config
            .backend_mappings
            .insert("secure.example".into(), "https://10.0.0.1/".into());
        config
            .backend_mappings
            .insert("broken.example".into(), "not a url".into());
        config.esi.max_rounds = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::NotPositive("esi.maxRounds")));
        assert!(errors.contains(&ValidationError::UnsupportedScheme {
            host: "secure.example".into(),
            scheme: "https".into(),
        }));
    }

    #[test]
    fn zero_strip_session_ttl_rejected() {
        let mut config = valid_config();
        config.session.strip_session_ttl_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::NotPositive("session.stripSessionTtlSecs")]
        );
    }

    #[test]
    fn empty_mappings_rejected() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoBackends]);
    }
}
