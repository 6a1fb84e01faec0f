//! What the relay accepts and which headers it passes along.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use regex::Regex;

use crate::config::RelayConfig;

pub const ALLOW_METHODS: &str = "GET, HEAD, OPTIONS";
pub const ALLOW_HEADERS: &str = "Range, Content-Type";
pub const EXPOSE_HEADERS: &str = "Content-Length, Content-Range, Accept-Ranges";
pub const PREFLIGHT_MAX_AGE: &str = "86400";

/// Upstream headers never copied to the client.
const DENIED_HEADERS: [&str; 3] = ["set-cookie", "connection", "transfer-encoding"];

#[derive(Debug, Clone)]
pub struct RelayPolicy {
    allow: Regex,
    cache_max_age: u32,
}

impl RelayPolicy {
    pub fn new(allow: Regex, cache_max_age: u32) -> Self {
        Self {
            allow,
            cache_max_age,
        }
    }

    /// # Errors
    /// - If `allow_pattern` is not a valid regular expression
    pub fn from_config(config: &RelayConfig) -> anyhow::Result<Self> {
        let allow = Regex::new(&config.allow_pattern).map_err(|e| {
            anyhow::anyhow!("Invalid relay allow_pattern '{}': {e}", config.allow_pattern)
        })?;
        Ok(Self::new(allow, config.cache_max_age))
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        self.allow.is_match(url)
    }

    pub fn forwards(&self, name: &HeaderName) -> bool {
        !DENIED_HEADERS.contains(&name.as_str())
    }

    /// Upstream headers minus the deny-list, with the relay's CORS and cache
    /// headers layered on top.
    pub fn response_headers(&self, upstream: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(upstream.len() + 5);
        for (name, value) in upstream {
            if self.forwards(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSE_HEADERS),
        );
        if let Ok(cache) = HeaderValue::from_str(&format!("public, max-age={}", self.cache_max_age))
        {
            headers.insert(header::CACHE_CONTROL, cache);
        }
        headers
    }
}
