//! Retry coordination across upstreams.
//!
//! # Responsibilities
//! - Pick an upstream per attempt, up to `max_attempts`
//! - Feed each outcome back into the registry
//! - Decide pass-through, retry or give up
//!
//! # Design Decisions
//! - Network errors and 5xx are upstream failures and are retried
//! - 1xx/2xx/3xx/4xx pass through untouched and are never retried
//! - An empty eligible set ends the request at once; retrying cannot help
//! - No backoff between attempts; each attempt goes to a freshly picked upstream

use std::sync::Arc;

use crate::error::ProxyError;
use crate::http::headers;
use crate::load_balancer::{Upstream, UpstreamRegistry};
use crate::observability::metrics;
use crate::resilience::forwarder::{Forward, ProxyRequest, UpstreamResponse};

/// A response that may be returned to the client as-is.
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub upstream: Upstream,
    pub response: UpstreamResponse,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Runs the bounded attempt loop for one inbound request.
#[derive(Clone)]
pub struct RetryCoordinator {
    registry: Arc<UpstreamRegistry>,
    forwarder: Arc<dyn Forward>,
    max_attempts: u32,
}

impl RetryCoordinator {
    pub fn new(registry: Arc<UpstreamRegistry>, forwarder: Arc<dyn Forward>, max_attempts: u32) -> Self {
        Self {
            registry,
            forwarder,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<UpstreamRegistry> {
        &self.registry
    }

    /// Forward `request`, retrying on alternate upstreams.
    ///
    /// Hop-by-hop headers are removed from the request before the first attempt
    /// and from the returned response, which also carries `x-lb-upstream`.
    pub async fn forward(&self, mut request: ProxyRequest) -> Result<ProxiedResponse, ProxyError> {
        request.headers = headers::sanitize(&request.headers);
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            let Some(upstream) = self.registry.pick() else {
                tracing::warn!(attempt, "No eligible upstream");
                return Err(ProxyError::NoEligibleUpstream);
            };

            match self.forwarder.send(&upstream, &request).await {
                Err(e) => {
                    tracing::warn!(upstream = %upstream, attempt, error = %e, "Upstream attempt failed");
                    metrics::record_attempt_failure(upstream.address(), e.kind());
                    self.registry.mark_failure(&upstream);
                    last_error = Some(format!("upstream {} {}", upstream, e));
                }
                Ok(response) if response.status.is_server_error() => {
                    tracing::warn!(upstream = %upstream, attempt, status = %response.status, "Upstream returned server error");
                    metrics::record_attempt_failure(upstream.address(), "server_error");
                    self.registry.mark_failure(&upstream);
                    last_error = Some(format!(
                        "upstream {} returned {}",
                        upstream,
                        response.status.as_u16()
                    ));
                }
                Ok(mut response) => {
                    self.registry.mark_success(&upstream);
                    response.headers = headers::sanitize(&response.headers);
                    headers::insert_upstream_identity(&mut response.headers, upstream.address());
                    return Ok(ProxiedResponse {
                        upstream,
                        response,
                        attempts: attempt,
                    });
                }
            }
        }

        Err(ProxyError::RetriesExhausted {
            last_error: last_error.unwrap_or_else(|| "no attempt completed".to_string()),
        })
    }
}
