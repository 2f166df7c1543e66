//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs, http/server.rs):
//!     Load config → Validate → Create registry + pool → Start prober → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain → Stop prober → Release pool
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Background tasks are owned by guards; no path leaks a running prober

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
