//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → retries.rs (attempt loop, up to max_attempts)
//!         → registry pick()
//!         → forwarder.rs (one attempt, connect and per-read budgets)
//!         → registry mark_success() / mark_failure()
//!     → ProxiedResponse or ProxyError
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound call has a deadline
//! - An unresponsive upstream costs at most connect + read per attempt; a
//!   responsive one is never cut off mid-body while data keeps arriving
//! - The circuit breaker lives in the registry, not here

pub mod forwarder;
pub mod retries;

#[cfg(test)]
pub(crate) mod testing;

pub use forwarder::{Forward, ForwardError, HttpForwarder, ProxyRequest, UpstreamResponse};
pub use retries::{ProxiedResponse, RetryCoordinator};
