//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → registry.rs pick() (eligible set computed at call time)
//!     → round_robin.rs (rotate through the eligible set)
//!     → forward attempt
//!     → registry.rs mark_success() / mark_failure()
//!
//! Health prober (concurrently)
//!     → registry.rs mark_success() / mark_failure()
//! ```
//!
//! # Design Decisions
//! - Membership is fixed at startup, order preserved
//! - One mutex over the whole registry; no per-field atomics
//! - Cooldown expiry is evaluated lazily on every query, never by a timer

pub mod registry;
pub mod round_robin;
pub mod upstream;

pub use registry::{UpstreamRegistry, UpstreamStatus};
pub use upstream::{BreakerState, Upstream};
