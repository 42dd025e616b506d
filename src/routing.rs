//! Route normalization and routing info.
//!
//! The platform prefixes every webtask URL with a route that depends on how
//! the request reached it (`/api/run/{container}/{jtn}`, `/{container}/{jtn}`
//! or a bare `/{jtn}` on a per-container host). Adapters strip that prefix so
//! the wrapped framework sees the path it was written against, and the Auth0
//! gateway derives the base URL used to build its `/login` and `/callback`
//! redirects.

use axum::http::{HeaderMap, Uri, header, request::Parts, uri::PathAndQuery};
use regex::Regex;
use std::collections::HashMap;

use crate::context::{UrlFormat, WebtaskClaims};
use crate::error::WebtaskError;

/// Build the regex matching the platform-injected prefix for the claims' URL format
pub fn normalization_regex(claims: &WebtaskClaims) -> Result<Regex, WebtaskError> {
    let container = regex::escape(&claims.container);
    let named = claims
        .jtn
        .as_deref()
        .filter(|jtn| !jtn.is_empty())
        .map(|jtn| format!("(?:{}/?)?", regex::escape(jtn)))
        .unwrap_or_default();

    let pattern = match claims.url_format {
        UrlFormat::SharedDomain => format!("^/api/run/{}/{}", container, named),
        UrlFormat::CustomDomain => format!("^/{}/{}", container, named),
        UrlFormat::WildcardDomain => format!("^/{}", named),
    };

    Regex::new(&pattern)
        .map_err(|e| WebtaskError::config(format!("Invalid route normalization pattern: {}", e)))
}

/// Replace the platform prefix at the start of `url` (path and query) with `/`
pub fn normalize_url(url: &str, claims: &WebtaskClaims) -> Result<String, WebtaskError> {
    let rx = normalization_regex(claims)?;
    Ok(rx.replace(url, "/").into_owned())
}

/// Rewrite the path and query of a request URI, keeping scheme and authority
pub fn rewrite_uri(uri: &Uri, claims: &WebtaskClaims) -> Result<Uri, WebtaskError> {
    let url = uri.path_and_query().map(PathAndQuery::as_str).unwrap_or("/");
    let normalized = normalize_url(url, claims)?;

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        normalized
            .parse::<PathAndQuery>()
            .map_err(|e| WebtaskError::config(format!("Invalid normalized URL: {}", e)))?,
    );

    Uri::from_parts(parts)
        .map_err(|e| WebtaskError::config(format!("Invalid normalized URL: {}", e)))
}

/// Request-scoped location of the webtask and of the path inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingInfo {
    /// Platform prefix, e.g. `/api/run/{container}/{jtn}`
    pub base_path: String,

    /// Path below the prefix, always starting with `/`
    pub app_path: String,

    /// Absolute URL of the webtask root, used to build redirects
    pub base_url: String,

    /// Parsed query string
    pub query: HashMap<String, String>,
}

impl RoutingInfo {
    /// Derive routing info from the raw (unrewritten) request URL.
    ///
    /// Accepted shapes, tried in order:
    /// - shared domain: `/api/run/{container}/{jtn}/...`
    /// - custom domain: `/{container}/{jtn}/...`
    /// - webtask subdomain: `/{jtn}/...` with a `Host` of `{container}.*`
    pub fn from_request(parts: &Parts, claims: &WebtaskClaims) -> Option<Self> {
        let jtn = claims.jtn.as_deref()?;
        let container = claims.container.as_str();
        let host = request_host(parts).unwrap_or_default();

        let segments: Vec<&str> = parts.uri.path().split('/').collect();
        let at = |i: usize| segments.get(i).copied();

        let prefix_len = if at(1) == Some("api")
            && at(2) == Some("run")
            && at(3) == Some(container)
            && at(4) == Some(jtn)
        {
            5
        } else if at(1) == Some(container) && at(2) == Some(jtn) {
            3
        } else if at(1) == Some(jtn) && host.starts_with(&format!("{}.", container)) {
            2
        } else {
            return None;
        };

        let base_path = segments[..prefix_len].join("/");
        let app_path = format!("/{}", segments[prefix_len..].join("/"));
        let proto = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("https");
        let base_url = format!("{}://{}{}", proto, host, base_path);

        Some(Self {
            base_path,
            app_path,
            base_url,
            query: parse_query_string(parts.uri.query().unwrap_or_default()),
        })
    }
}

/// Parses a query string into a HashMap of key-value pairs
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str(query).unwrap_or_default()
}

fn request_host(parts: &Parts) -> Option<String> {
    host_header(&parts.headers).or_else(|| parts.uri.authority().map(|a| a.to_string()))
}

fn host_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
