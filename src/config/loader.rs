//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{BalancerConfig, UpstreamList};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file, apply `LB_*` environment overrides and validate the result.
pub fn load_config(path: &Path) -> Result<BalancerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: BalancerConfig = toml::from_str(&content)?;
    finalize(config, |key| std::env::var(key).ok())
}

impl BalancerConfig {
    /// Defaults plus `LB_*` environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        finalize(Self::default(), |key| std::env::var(key).ok())
    }
}

fn finalize<F>(mut config: BalancerConfig, lookup: F) -> Result<BalancerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env_errors = apply_env_overrides(&mut config, lookup);
    normalize(&mut config);

    let mut errors = env_errors;
    if let Err(mut invalid) = validate_config(&config) {
        errors.append(&mut invalid);
    }
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Validation(errors))
    }
}

/// Apply environment overrides through `lookup`, returning any unparseable values.
pub fn apply_env_overrides<F>(config: &mut BalancerConfig, lookup: F) -> Vec<ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    if let Some(v) = lookup("LB_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("LB_UPSTREAMS") {
        config.upstreams = UpstreamList::parse_delimited(&v);
    }
    if let Some(v) = lookup("LB_HEALTH_PATH") {
        config.health_check.path = v;
    }
    if let Some(v) = lookup("LB_ADMIN_API_KEY") {
        config.admin.api_key = v;
    }

    let mut count = |key: &'static str, target: &mut u32| {
        if let Some(raw) = lookup(key) {
            match raw.trim().parse() {
                Ok(n) => *target = n,
                Err(_) => errors.push(ValidationError::InvalidEnv { key, value: raw }),
            }
        }
    };
    count("LB_FAIL_THRESHOLD", &mut config.breaker.fail_threshold);
    count("LB_RETRIES", &mut config.retries.max_attempts);

    let mut seconds = |key: &'static str, target: &mut u64| {
        if let Some(raw) = lookup(key) {
            match parse_seconds_as_millis(&raw) {
                Some(ms) => *target = ms,
                None => errors.push(ValidationError::InvalidEnv { key, value: raw }),
            }
        }
    };
    seconds("LB_COOLDOWN_SEC", &mut config.breaker.cooldown_ms);
    seconds("LB_CHECK_INTERVAL", &mut config.health_check.interval_ms);
    seconds("LB_HEALTH_TIMEOUT", &mut config.health_check.timeout_ms);
    seconds("LB_CONNECT_TIMEOUT", &mut config.timeouts.connect_ms);
    seconds("LB_READ_TIMEOUT", &mut config.timeouts.read_ms);

    errors
}

/// Fractional seconds ("0.3") to whole milliseconds.
fn parse_seconds_as_millis(raw: &str) -> Option<u64> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as u64)
}

fn normalize(config: &mut BalancerConfig) {
    for address in config.upstreams.0.iter_mut() {
        let trimmed = address.trim().trim_end_matches('/').to_string();
        *address = trimmed;
    }
}
