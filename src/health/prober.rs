//! Active health probing.
//!
//! # Responsibilities
//! - Periodically probe every upstream's health endpoint
//! - Feed results into the registry, recovering upstreams after cooldown

use axum::http::{header, HeaderValue, StatusCode};
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::load_balancer::{Upstream, UpstreamRegistry};
use crate::observability::metrics;
use crate::resilience::forwarder::{Forward, ProxyRequest};

const PROBE_USER_AGENT: &str = "circuit-balancer-health-check";

pub struct HealthProber {
    registry: Arc<UpstreamRegistry>,
    forwarder: Arc<dyn Forward>,
    config: HealthCheckConfig,
}

impl HealthProber {
    pub fn new(
        registry: Arc<UpstreamRegistry>,
        forwarder: Arc<dyn Forward>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            forwarder,
            config,
        }
    }

    /// Probe on every tick until `shutdown` fires. The first cycle runs immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.config.interval_ms,
            path = %self.config.path,
            upstreams = self.registry.len(),
            "Health prober starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health prober received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One probe cycle over a snapshot of the membership. Returns each upstream's result.
    pub async fn probe_all(&self) -> Vec<(Upstream, bool)> {
        let upstreams = self.registry.upstreams().to_vec();
        let results = join_all(upstreams.iter().map(|u| self.probe(u))).await;

        upstreams
            .into_iter()
            .zip(results)
            .map(|(upstream, healthy)| {
                if healthy {
                    self.registry.mark_success(&upstream);
                } else {
                    self.registry.mark_failure(&upstream);
                }
                metrics::record_health_probe(upstream.address(), healthy);
                (upstream, healthy)
            })
            .collect()
    }

    async fn probe(&self, upstream: &Upstream) -> bool {
        let mut request = ProxyRequest::get(self.config.path.clone());
        request
            .headers
            .insert(header::USER_AGENT, HeaderValue::from_static(PROBE_USER_AGENT));

        match time::timeout(self.config.timeout(), self.forwarder.send(upstream, &request)).await {
            Ok(Ok(response)) if response.status == StatusCode::OK => true,
            Ok(Ok(response)) => {
                tracing::warn!(upstream = %upstream, status = %response.status, "Health check failed: non-200 status");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(upstream = %upstream, error = %e, "Health check failed");
                false
            }
            Err(_) => {
                tracing::warn!(upstream = %upstream, timeout_ms = self.config.timeout_ms, "Health check failed: timeout");
                false
            }
        }
    }
}
