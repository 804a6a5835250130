//! API server configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server port
    pub port: u16,
    /// Budget for reading the request
    pub read_timeout: Duration,
    /// Budget for producing the response
    pub write_timeout: Duration,
    /// Graceful shutdown budget
    pub shutdown_timeout: Duration,
    /// Base URL of the caching edge that serves HLS content
    pub cdn_base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            cdn_base_url: "http://localhost:8081".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from `API_*` and `CDN_BASE_URL` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            read_timeout: duration_from_env("API_READ_TIMEOUT", defaults.read_timeout),
            write_timeout: duration_from_env("API_WRITE_TIMEOUT", defaults.write_timeout),
            shutdown_timeout: duration_from_env("API_SHUTDOWN_TIMEOUT", defaults.shutdown_timeout),
            cdn_base_url: std::env::var("CDN_BASE_URL").unwrap_or(defaults.cdn_base_url),
        }
    }
}

fn duration_from_env(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
