//! Header manipulation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from forwarded requests and responses
//! - Recognize the `strip-session` Cache-Control token
//! - Decide whether a response body is HTML we may scan
//!
//! # Design Decisions
//! - Headers named in `Connection` are hop-by-hop too (RFC 9110 §7.6.1)
//! - Cache-Control tokens are compared case-sensitively after trimming

use axum::http::{header, HeaderMap, HeaderName, Method};

/// Cache-Control token that marks a URL for session stripping.
pub const STRIP_SESSION_TOKEN: &str = "strip-session";

static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("proxy-connection");
}

/// True if any `Cache-Control` value carries the `strip-session` token.
pub fn has_strip_session(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim() == STRIP_SESSION_TOKEN)
}

/// True if a response to `method` with these headers can be scanned for directives.
///
/// Only identity-encoded `text/html` bodies qualify; HEAD responses carry no body.
pub fn is_scannable(method: &Method, headers: &HeaderMap) -> bool {
    if *method == Method::HEAD {
        return false;
    }

    let html = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case("text/html")
        })
        .unwrap_or(false);

    let identity = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("identity"))
        .unwrap_or(true);

    html && identity
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn strips_standard_and_listed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert(header::COOKIE, HeaderValue::from_static("a=1"));

        strip_hop_by_hop(&mut headers);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("x-trace").is_none());
        assert_eq!(headers.get(header::COOKIE).unwrap(), "a=1");
    }

    #[test]
    fn detects_strip_session_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("public,  strip-session "));
        assert!(has_strip_session(&headers));

        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("public, Strip-Session"));
        assert!(!has_strip_session(&headers));

        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-strip-session"));
        assert!(!has_strip_session(&headers));
    }

    #[test]
    fn scannable_only_for_identity_html() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        assert!(is_scannable(&Method::GET, &headers));
        assert!(!is_scannable(&Method::HEAD, &headers));

        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert!(!is_scannable(&Method::GET, &headers));

        let mut json = HeaderMap::new();
        json.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_scannable(&Method::GET, &json));
    }
}
