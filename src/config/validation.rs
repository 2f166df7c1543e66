//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate upstream addresses and value ranges (timeouts > 0, thresholds >= 1)
//! - Detect duplicate upstreams
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::BalancerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one upstream address is required")]
    NoUpstreams,

    #[error("upstream `{address}` is not a valid http base URL: {reason}")]
    InvalidUpstream { address: String, reason: String },

    #[error("upstream `{0}` is listed more than once")]
    DuplicateUpstream(String),

    #[error("`{field}` must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("`{field}` must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("health check path `{0}` must start with `/`")]
    InvalidHealthPath(String),

    #[error("`{field}` is not a valid socket address: `{value}`")]
    InvalidBindAddress { field: &'static str, value: String },

    #[error("environment variable {key} has invalid value `{value}`")]
    InvalidEnv { key: &'static str, value: String },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstreams.is_empty() {
        errors.push(ValidationError::NoUpstreams);
    }

    let mut seen = HashSet::new();
    for address in config.upstreams.iter() {
        if let Err(reason) = check_upstream(address) {
            errors.push(ValidationError::InvalidUpstream {
                address: address.clone(),
                reason,
            });
        }
        if !seen.insert(address.trim_end_matches('/')) {
            errors.push(ValidationError::DuplicateUpstream(address.clone()));
        }
    }

    if config.breaker.fail_threshold == 0 {
        errors.push(ValidationError::ZeroCount { field: "breaker.fail_threshold" });
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroCount { field: "retries.max_attempts" });
    }

    let durations = [
        ("breaker.cooldown_ms", config.breaker.cooldown_ms),
        ("health_check.interval_ms", config.health_check.interval_ms),
        ("health_check.timeout_ms", config.health_check.timeout_ms),
        ("timeouts.connect_ms", config.timeouts.connect_ms),
        ("timeouts.read_ms", config.timeouts.read_ms),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration { field });
        }
    }

    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(config.health_check.path.clone()));
    }

    check_bind(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_bind(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_bind(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream(address: &str) -> Result<(), String> {
    let url = Url::parse(address).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme `{}`", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("base address must not carry a query or fragment".to_string());
    }
    Ok(())
}

fn check_bind(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            field,
            value: value.to_string(),
        });
    }
}
