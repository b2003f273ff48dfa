//! HTTP surface configuration for the `/health` and `/metrics` listener.

use std::time::Duration;

/// Configuration for the health/metrics HTTP surface.
///
/// Distinct from [`crate::config::ServerConfig`], which carries the
/// process-wide CLI/env configuration; this type holds only what
/// [`super::module::NetworkModule`] needs to assemble its router.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
        }
    }
}
