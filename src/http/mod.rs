//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → buffer body, build ProxyRequest
//!     → retry coordinator (headers.rs strips hop-by-hop on both legs)
//!     → upstream response + x-lb-upstream, or 503 with diagnostic body
//!     → Send to client
//! ```

pub mod headers;
pub mod server;

pub use headers::X_LB_UPSTREAM;
pub use server::HttpServer;
