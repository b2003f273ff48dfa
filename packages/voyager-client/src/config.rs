//! Discovery client configuration, loaded from CLI flags or
//! `VOYAGER_`-prefixed environment variables via `clap`'s `env` feature.

use std::time::Duration;

use clap::Parser;

/// Recognized configuration for the discovery client.
///
/// `health_check_interval` of zero selects the derived default of
/// `cache_ttl / 3`, clamped to at least 5 seconds, per the health-check loop
/// contract.
#[derive(Debug, Clone, Parser)]
#[command(name = "voyager-client", about = "VoyagerSD discovery client")]
pub struct ClientConfig {
    /// Address of the registry server's framed discovery listener.
    #[arg(long, env = "VOYAGER_GRPC_ADDR", default_value = "127.0.0.1:50050")]
    pub discovery_addr: String,

    /// Shared bearer token. Empty sends no credential.
    #[arg(long, env = "VOYAGER_AUTH_TOKEN", default_value = "")]
    pub auth_token: String,

    /// Lease length and discovery-cache horizon.
    #[arg(long, env = "VOYAGER_CACHE_TTL", value_parser = parse_duration_secs, default_value = "30")]
    pub cache_ttl: Duration,

    /// Health-check tick interval. Zero derives `cache_ttl / 3`, clamped to ≥ 5s.
    #[arg(long, env = "VOYAGER_HEALTH_CHECK_INTERVAL", value_parser = parse_duration_secs, default_value = "0")]
    pub health_check_interval: Duration,

    /// Number of connection attempts made while dialing the registry server.
    #[arg(long, env = "VOYAGER_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Delay between connection attempts while dialing the registry server.
    #[arg(long, env = "VOYAGER_RETRY_DELAY", value_parser = parse_duration_secs, default_value = "1")]
    pub retry_delay: Duration,

    /// Dial timeout used by the connection pool for instance connections.
    #[arg(long, env = "VOYAGER_CONNECTION_TIMEOUT", value_parser = parse_duration_secs, default_value = "5")]
    pub connection_timeout: Duration,
}

impl ClientConfig {
    /// The effective health-check tick interval: the configured value if
    /// non-zero, otherwise `cache_ttl / 3` clamped to a 5-second floor.
    #[must_use]
    pub fn effective_health_check_interval(&self) -> Duration {
        if self.health_check_interval.is_zero() {
            (self.cache_ttl / 3).max(Duration::from_secs(5))
        } else {
            self.health_check_interval
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            discovery_addr: "127.0.0.1:50050".to_string(),
            auth_token: String::new(),
            cache_ttl: Duration::from_secs(30),
            health_check_interval: Duration::ZERO,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

fn parse_duration_secs(s: &str) -> Result<Duration, String> {
    let secs: u64 = s.parse().map_err(|_| format!("not a valid integer: {s}"))?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_derives_from_cache_ttl() {
        let config = ClientConfig {
            cache_ttl: Duration::from_secs(30),
            health_check_interval: Duration::ZERO,
            ..ClientConfig::default()
        };
        assert_eq!(config.effective_health_check_interval(), Duration::from_secs(10));
    }

    #[test]
    fn derived_interval_is_clamped_to_five_seconds() {
        let config = ClientConfig {
            cache_ttl: Duration::from_secs(6),
            health_check_interval: Duration::ZERO,
            ..ClientConfig::default()
        };
        assert_eq!(config.effective_health_check_interval(), Duration::from_secs(5));
    }

    #[test]
    fn explicit_interval_is_not_overridden() {
        let config = ClientConfig {
            cache_ttl: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(2),
            ..ClientConfig::default()
        };
        assert_eq!(config.effective_health_check_interval(), Duration::from_secs(2));
    }
}
