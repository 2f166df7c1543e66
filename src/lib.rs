//! Circuit-breaking HTTP load balancer.
//!
//! Distributes inbound requests round-robin over a fixed list of upstreams,
//! retries failed attempts on alternate upstreams, and takes failing upstreams
//! out of rotation for a cooldown window. A background prober feeds the same
//! per-upstream breaker state.

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::BalancerConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
