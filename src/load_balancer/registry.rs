//! Upstream registry: per-upstream circuit breaker state behind one lock.
//!
//! # Responsibilities
//! - Own the fixed, ordered upstream membership
//! - Select an eligible upstream (round-robin)
//! - Apply success/failure reports from requests and health probes

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::BreakerConfig;
use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::upstream::{Upstream, UpstreamState};
use crate::observability::metrics;

#[derive(Debug)]
struct RegistryInner {
    states: Vec<UpstreamState>,
    rotation: RoundRobin,
}

/// Shared registry of upstreams.
///
/// `pick`, `mark_success` and `mark_failure` run under a single mutex. Critical
/// sections are O(upstreams) and never perform I/O; logging and metrics happen
/// after the guard is released.
#[derive(Debug)]
pub struct UpstreamRegistry {
    inner: Mutex<RegistryInner>,
    upstreams: Vec<Upstream>,
    fail_threshold: u32,
    cooldown: Duration,
}

/// Point-in-time view of one upstream.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpstreamStatus {
    pub address: String,
    pub state: &'static str,
    pub consecutive_failures: u32,
    pub cooldown_remaining_ms: Option<u64>,
}

impl UpstreamStatus {
    pub fn is_eligible(&self) -> bool {
        self.cooldown_remaining_ms.is_none()
    }
}

impl UpstreamRegistry {
    /// Create a registry over `addresses`, preserving their order.
    pub fn new<I, S>(addresses: I, config: &BreakerConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let upstreams: Vec<Upstream> = addresses
            .into_iter()
            .enumerate()
            .map(|(id, addr)| Upstream::new(id, addr.as_ref()))
            .collect();
        let states = upstreams.iter().cloned().map(UpstreamState::new).collect();

        Self {
            inner: Mutex::new(RegistryInner {
                states,
                rotation: RoundRobin::new(),
            }),
            upstreams,
            fail_threshold: config.fail_threshold.max(1),
            cooldown: config.cooldown(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // State is plain counters and timestamps; a panic elsewhere cannot leave it torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All registered upstreams in configuration order.
    pub fn upstreams(&self) -> &[Upstream] {
        &self.upstreams
    }

    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    /// Select the next eligible upstream, or `None` if every upstream is cooling.
    pub fn pick(&self) -> Option<Upstream> {
        self.pick_at(Instant::now())
    }

    pub fn pick_at(&self, now: Instant) -> Option<Upstream> {
        let (picked, expired) = {
            let mut inner = self.lock();
            let RegistryInner { states, rotation } = &mut *inner;
            let expired = expire_cooldowns(states, now);
            let eligible: Vec<&UpstreamState> = states.iter().filter(|s| s.is_eligible(now)).collect();
            let picked = rotation
                .next_index(eligible.len())
                .map(|index| eligible[index].upstream.clone());
            (picked, expired)
        };

        report_expired(&expired);
        picked
    }

    /// Reset the upstream's failure count and cooldown.
    pub fn mark_success(&self, upstream: &Upstream) {
        let recovered = {
            let mut inner = self.lock();
            match inner.states.get_mut(upstream.id()) {
                Some(state) => state.record_success(),
                None => return,
            }
        };

        if recovered {
            tracing::info!(upstream = %upstream, "Upstream recovered");
        }
        metrics::record_upstream_eligible(upstream.address(), true);
    }

    /// Count a failure, entering cooldown once the threshold is reached.
    pub fn mark_failure(&self, upstream: &Upstream) {
        self.mark_failure_at(upstream, Instant::now());
    }

    pub fn mark_failure_at(&self, upstream: &Upstream, now: Instant) {
        let (tripped, failures) = {
            let mut inner = self.lock();
            match inner.states.get_mut(upstream.id()) {
                Some(state) => (
                    state.record_failure(now, self.fail_threshold, self.cooldown),
                    state.consecutive_failures,
                ),
                None => return,
            }
        };

        if tripped {
            tracing::warn!(
                upstream = %upstream,
                consecutive_failures = failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "Upstream entering cooldown"
            );
            metrics::record_upstream_eligible(upstream.address(), false);
        } else {
            tracing::debug!(upstream = %upstream, consecutive_failures = failures, "Upstream failure recorded");
        }
    }

    /// Status of every upstream, in configuration order.
    pub fn snapshot(&self) -> Vec<UpstreamStatus> {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> Vec<UpstreamStatus> {
        let (statuses, expired) = {
            let mut inner = self.lock();
            let expired = expire_cooldowns(&mut inner.states, now);
            let statuses = inner
                .states
                .iter()
                .map(|s| {
                    let remaining = s.cooldown_remaining(now);
                    UpstreamStatus {
                        address: s.upstream.address().to_string(),
                        state: if remaining.is_some() { "cooling" } else { "eligible" },
                        consecutive_failures: s.consecutive_failures,
                        cooldown_remaining_ms: remaining.map(|d| d.as_millis() as u64),
                    }
                })
                .collect();
            (statuses, expired)
        };

        report_expired(&expired);
        statuses
    }
}

/// Move every elapsed cooldown to `Eligible`, returning the upstreams that changed.
fn expire_cooldowns(states: &mut [UpstreamState], now: Instant) -> Vec<Upstream> {
    states
        .iter_mut()
        .filter_map(|s| s.expire_cooldown(now).then(|| s.upstream.clone()))
        .collect()
}

fn report_expired(expired: &[Upstream]) {
    for upstream in expired {
        tracing::info!(upstream = %upstream, "Upstream cooldown elapsed");
        metrics::record_upstream_eligible(upstream.address(), true);
    }
}
