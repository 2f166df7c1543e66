//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active probing (prober.rs):
//!     Periodic timer
//!     → Probe every upstream concurrently (GET health path)
//!     → 200 → registry mark_success()
//!     → anything else, error, timeout → registry mark_failure()
//!
//! Passive detection:
//!     handled by the retry coordinator on live traffic
//! ```
//!
//! # Design Decisions
//! - One long-lived task for the process lifetime
//! - No probe backoff; the breaker cooldown alone suppresses traffic
//! - Per-probe timeout so one hanging upstream cannot stall a cycle

pub mod prober;

pub use prober::HealthProber;
