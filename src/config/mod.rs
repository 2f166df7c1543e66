//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), optional
//!     → loader.rs (parse & deserialize, LB_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → shared by value/clone with all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is static for the process lifetime; no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BalancerConfig, BreakerConfig, HealthCheckConfig, LimitsConfig, ListenerConfig,
    ObservabilityConfig, PoolConfig, RetryConfig, TimeoutConfig, UpstreamList,
};
pub use validation::{validate_config, ValidationError};
