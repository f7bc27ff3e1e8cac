//! Client configuration

use std::time::Duration;

/// Largest logic sheet the backend accepts (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for the backend client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service base URL, without trailing slash
    pub base_url: String,
    /// API route prefix
    pub api_prefix: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Interval between liveness probes
    pub health_interval: Duration,
    /// Upload size ceiling enforced before the network
    pub max_upload_bytes: usize,
}

impl ClientConfig {
    /// Configuration for a backend at the given base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// With a per-request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// With a liveness probe interval
    #[inline]
    #[must_use]
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Full URL for an API route
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }

    /// Full URL for a non-API route (health lives at the root)
    #[must_use]
    pub fn root_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            // Generation runs an LLM pipeline server-side; allow it time
            request_timeout: Duration::from_secs(120),
            health_interval: Duration::from_secs(10),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined() {
        let config = ClientConfig::new("http://plc-rag:8000/");
        assert_eq!(
            config.api_url("/upload"),
            "http://plc-rag:8000/api/v1/upload"
        );
        assert_eq!(config.root_url("/health"), "http://plc-rag:8000/health");
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::default()
            .with_request_timeout(Duration::from_secs(5))
            .with_health_interval(Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.health_interval, Duration::from_secs(1));
    }
}
