//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Ordered upstream base addresses. Accepts a comma separated string or a list.
    #[serde(deserialize_with = "string_or_list")]
    pub upstreams: UpstreamList,

    /// Health prober settings.
    pub health_check: HealthCheckConfig,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Per-attempt network budgets.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Outbound connection pool tuning.
    pub pool: PoolConfig,

    /// Inbound request limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Ordered list of upstream base addresses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct UpstreamList(pub Vec<String>);

impl UpstreamList {
    /// Split a comma separated list, trimming whitespace and dropping empty entries.
    pub fn parse_delimited(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for UpstreamList {
    fn default() -> Self {
        Self::parse_delimited("http://app1:8000,http://app2:8000")
    }
}

impl<S: Into<String>> FromIterator<S> for UpstreamList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<UpstreamList, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Delimited(String),
        List(Vec<String>),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Delimited(s) => UpstreamList::parse_delimited(&s),
        Raw::List(items) => items
            .iter()
            .flat_map(|item| UpstreamList::parse_delimited(item).0)
            .collect(),
    })
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the background prober.
    pub enabled: bool,

    /// Path appended to each upstream address for probing.
    pub path: String,

    /// Period between prober cycles in milliseconds.
    pub interval_ms: u64,

    /// Upper bound for a single probe in milliseconds.
    pub timeout_ms: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/health".to_string(),
            interval_ms: 2_000,
            timeout_ms: 2_000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before an upstream enters cooldown.
    pub fail_threshold: u32,

    /// Time an upstream stays ineligible after tripping, in milliseconds.
    pub cooldown_ms: u64,
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            fail_threshold: 2,
            cooldown_ms: 5_000,
        }
    }
}

/// Per-attempt timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Read/write timeout in milliseconds.
    pub read_ms: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 300,
            read_ms: 1_500,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum forward attempts per inbound request.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

/// Outbound connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle keep-alive connections kept per upstream host.
    pub max_idle_per_host: usize,

    /// How long an idle pooled connection is kept, in milliseconds.
    pub idle_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 50,
            idle_timeout_ms: 90_000,
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest request body read before forwarding.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin listener.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin listener bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = BalancerConfig::default();
        assert_eq!(
            config.upstreams.0,
            vec!["http://app1:8000".to_string(), "http://app2:8000".to_string()]
        );
        assert_eq!(config.breaker.fail_threshold, 2);
        assert_eq!(config.breaker.cooldown(), Duration::from_secs(5));
        assert_eq!(config.health_check.interval(), Duration::from_secs(2));
        assert_eq!(config.timeouts.connect(), Duration::from_millis(300));
        assert_eq!(config.timeouts.read(), Duration::from_millis(1500));
        assert_eq!(config.retries.max_attempts, 2);
    }

    #[test]
    fn test_upstreams_accept_delimited_string() {
        let config: BalancerConfig =
            toml::from_str(r#"upstreams = "http://a:1, http://b:2,,""#).unwrap();
        assert_eq!(config.upstreams.0, vec!["http://a:1", "http://b:2"]);
    }

    #[test]
    fn test_upstreams_accept_list() {
        let config: BalancerConfig = toml::from_str(
            r#"
            upstreams = ["http://a:1", "http://b:2"]

            [breaker]
            fail_threshold = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.upstreams.0, vec!["http://a:1", "http://b:2"]);
        assert_eq!(config.breaker.fail_threshold, 4);
        assert_eq!(config.breaker.cooldown_ms, 5_000);
    }
}
