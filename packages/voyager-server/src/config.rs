//! Registry server configuration, loaded from CLI flags or `VOYAGER_`-prefixed
//! environment variables via `clap`'s `env` feature.

use std::time::Duration;

use clap::Parser;

/// Recognized configuration for the registry server.
///
/// `etcd_endpoints` empty selects in-memory mode; all other durations derive
/// their defaults from `cache_ttl` per spec semantics (refresher/janitor
/// period, client discovery cache horizon).
#[derive(Debug, Clone, Parser)]
#[command(name = "voyager-server", about = "VoyagerSD registry server")]
pub struct ServerConfig {
    /// Comma-separated etcd endpoint URLs. Empty selects in-memory mode.
    #[arg(long, env = "VOYAGER_ETCD_ENDPOINTS", value_delimiter = ',', default_value = "")]
    pub etcd_endpoints: Vec<String>,

    /// Lease length, refresher/janitor period multiplier, and client cache horizon.
    #[arg(long, env = "VOYAGER_CACHE_TTL", value_parser = parse_duration_secs, default_value = "30")]
    pub cache_ttl: Duration,

    /// Shared bearer token. Empty disables the auth gate.
    #[arg(long, env = "VOYAGER_AUTH_TOKEN", default_value = "")]
    pub auth_token: String,

    /// Bind address for the framed discovery RPC listener.
    #[arg(long, env = "VOYAGER_GRPC_ADDR", default_value = "0.0.0.0:50050")]
    pub grpc_addr: String,

    /// Bind address for the `/health` and `/metrics` HTTP surface.
    #[arg(long, env = "VOYAGER_METRICS_ADDR", default_value = "0.0.0.0:2112")]
    pub metrics_addr: String,

    /// Interval between periodic status log lines.
    #[arg(long, env = "VOYAGER_LOG_INTERVAL", value_parser = parse_duration_secs, default_value = "15")]
    pub log_interval: Duration,

    /// `text` or `json` tracing output.
    #[arg(long, env = "VOYAGER_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Enables verbose (debug-level) tracing.
    #[arg(long, env = "VOYAGER_DEBUG", default_value_t = false)]
    pub debug: bool,
}

impl ServerConfig {
    /// `etcd_endpoints` empty (after dropping blank entries from the default
    /// `""` value) selects in-memory mode.
    #[must_use]
    pub fn in_memory_mode(&self) -> bool {
        self.etcd_endpoints.iter().all(|e| e.trim().is_empty())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            etcd_endpoints: Vec::new(),
            cache_ttl: Duration::from_secs(30),
            auth_token: String::new(),
            grpc_addr: "0.0.0.0:50050".to_string(),
            metrics_addr: "0.0.0.0:2112".to_string(),
            log_interval: Duration::from_secs(15),
            log_format: LogFormat::Text,
            debug: false,
        }
    }
}

/// Tracing output format, selected by `logFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

fn parse_duration_secs(s: &str) -> Result<Duration, String> {
    let secs: u64 = s.parse().map_err(|_| format!("not a valid integer: {s}"))?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_in_memory_mode() {
        assert!(ServerConfig::default().in_memory_mode());
    }

    #[test]
    fn non_empty_endpoints_select_store_backed_mode() {
        let config = ServerConfig {
            etcd_endpoints: vec!["http://localhost:2379".to_string()],
            ..ServerConfig::default()
        };
        assert!(!config.in_memory_mode());
    }

    #[test]
    fn blank_endpoint_entries_are_treated_as_in_memory() {
        let config = ServerConfig {
            etcd_endpoints: vec![String::new()],
            ..ServerConfig::default()
        };
        assert!(config.in_memory_mode());
    }
}
