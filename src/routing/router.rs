//! Host → backend lookup.
//!
//! # Responsibilities
//! - Store parsed backend base URLs keyed by host
//! - Resolve a host to its backend, falling back to `"default"`
//! - Rewrite a URL's scheme and authority onto the routed backend
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) host lookup via HashMap
//! - Host matching is case-insensitive; the port is part of the key
//! - Explicit `NoBackend` rather than a silent fallback to anything

use std::collections::HashMap;

use url::Url;

use crate::config::DEFAULT_BACKEND_KEY;

/// Error returned when a host cannot be routed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no backend mapping for host '{0}' and no default")]
    NoBackend(String),

    #[error("backend URL for '{host}' is invalid: {url}")]
    InvalidBackend { host: String, url: String },

    #[error("URL has no host to route: {0}")]
    MissingHost(String),

    #[error("cannot rewrite '{url}' onto backend {backend}")]
    Rewrite { url: String, backend: String },
}

/// Routes request hosts to backend base URLs.
#[derive(Debug, Clone)]
pub struct BackendRouter {
    backends: HashMap<String, Url>,
}

impl BackendRouter {
    /// Build a router from the configured `backendMappings`.
    pub fn from_mappings(mappings: &HashMap<String, String>) -> Result<Self, RouteError> {
        let mut backends = HashMap::with_capacity(mappings.len());
        for (host, url) in mappings {
            let parsed = Url::parse(url)
                .ok()
                .filter(|u| u.host_str().is_some())
                .ok_or_else(|| RouteError::InvalidBackend {
                    host: host.clone(),
                    url: url.clone(),
                })?;
            backends.insert(host.to_lowercase(), parsed);
        }
        Ok(Self { backends })
    }

    /// Find the backend base URL for a host.
    pub fn route(&self, host: &str) -> Result<&Url, RouteError> {
        self.backends
            .get(&host.to_lowercase())
            .or_else(|| self.backends.get(DEFAULT_BACKEND_KEY))
            .ok_or_else(|| RouteError::NoBackend(host.to_string()))
    }

    /// Overwrite the scheme, host and port of `url` with those of the backend
    /// its authority routes to. Path and query are left untouched.
    ///
    /// Returns the backend base URL that was applied.
    pub fn rewrite(&self, url: &mut Url) -> Result<Url, RouteError> {
        let authority = authority_of(url).ok_or_else(|| RouteError::MissingHost(url.to_string()))?;
        let backend = self.route(&authority)?.clone();

        let original = url.to_string();
        let rewrite_err = || RouteError::Rewrite {
            url: original.clone(),
            backend: backend.to_string(),
        };

        if url.scheme() != backend.scheme() {
            url.set_scheme(backend.scheme()).map_err(|_| rewrite_err())?;
        }
        url.set_host(backend.host_str()).map_err(|_| rewrite_err())?;
        url.set_port(backend.port()).map_err(|_| rewrite_err())?;

        Ok(backend)
    }

    /// Number of configured mappings, including the default.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// `host[:port]` of a URL, the form used as a routing key.
pub fn authority_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> BackendRouter {
        let mut mappings = HashMap::new();
        mappings.insert("a.example".to_string(), "http://backendA/".to_string());
        mappings.insert("default".to_string(), "http://backendB/".to_string());
        BackendRouter::from_mappings(&mappings).unwrap()
    }

    #[test]
    fn test_route_mapped_and_default() {
        let router = router();
        assert_eq!(router.route("a.example").unwrap().host_str(), Some("backenda"));
        assert_eq!(router.route("unknown.example").unwrap().host_str(), Some("backendb"));
    }

    #[test]
    fn test_route_case_insensitive() {
        let router = router();
        assert_eq!(router.route("A.Example").unwrap().host_str(), Some("backenda"));
    }

    #[test]
    fn test_route_without_default() {
        let mut mappings = HashMap::new();
        mappings.insert("a.example".to_string(), "http://backendA/".to_string());
        let router = BackendRouter::from_mappings(&mappings).unwrap();

        assert_eq!(
            router.route("b.example"),
            Err(RouteError::NoBackend("b.example".to_string()))
        );
    }

    #[test]
    fn test_rewrite_keeps_path_and_query() {
        let mut mappings = HashMap::new();
        mappings.insert("www.example.com".to_string(), "http://10.0.0.5:8001/ignored".to_string());
        let router = BackendRouter::from_mappings(&mappings).unwrap();

        let mut url = Url::parse("http://www.example.com/news/item?id=7").unwrap();
        router.rewrite(&mut url).unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.5:8001/news/item?id=7");
    }

    #[test]
    fn test_rewrite_drops_source_port() {
        let router = router();
        let mut url = Url::parse("http://cdn.example:8080/a.js").unwrap();
        router.rewrite(&mut url).unwrap();
        assert_eq!(url.as_str(), "http://backendb/a.js");
    }

    #[test]
    fn test_invalid_backend_rejected() {
        let mut mappings = HashMap::new();
        mappings.insert("default".to_string(), "::nope".to_string());
        assert!(matches!(
            BackendRouter::from_mappings(&mappings),
            Err(RouteError::InvalidBackend { .. })
        ));
    }
}
