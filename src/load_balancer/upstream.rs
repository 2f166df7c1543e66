//! Upstream abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream base address
//! - Hold its circuit breaker state (Eligible/Cooling)
//! - Apply success/failure transitions

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cheap handle to a registered upstream.
///
/// Handles are created by the registry and stay valid for the process lifetime;
/// `id` is the insertion position in the configured list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Upstream {
    id: usize,
    address: Arc<str>,
}

impl Upstream {
    pub(crate) fn new(id: usize, address: &str) -> Self {
        Self {
            id,
            address: Arc::from(address.trim_end_matches('/')),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Base address as configured, without a trailing slash.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Target URL for `path` (leading `/` expected) and an optional query string.
    pub fn url_for(&self, path: &str, query: Option<&str>) -> String {
        let mut url = String::with_capacity(self.address.len() + path.len() + 1);
        url.push_str(&self.address);
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        url
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Circuit breaker state.
///
/// `Cooling::until` is the single source of truth for eligibility; a cooling
/// upstream becomes eligible again as soon as `now >= until`, without any reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Eligible,
    Cooling { until: Instant },
}

/// Breaker bookkeeping for one upstream. Only mutated under the registry lock.
#[derive(Debug)]
pub(crate) struct UpstreamState {
    pub(crate) upstream: Upstream,
    pub(crate) consecutive_failures: u32,
    pub(crate) breaker: BreakerState,
}

impl UpstreamState {
    pub(crate) fn new(upstream: Upstream) -> Self {
        Self {
            upstream,
            consecutive_failures: 0,
            breaker: BreakerState::Eligible,
        }
    }

    pub(crate) fn is_eligible(&self, now: Instant) -> bool {
        match self.breaker {
            BreakerState::Eligible => true,
            BreakerState::Cooling { until } => now >= until,
        }
    }

    /// Remaining cooldown at `now`, if still cooling.
    pub(crate) fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        match self.breaker {
            BreakerState::Cooling { until } if now < until => Some(until - now),
            _ => None,
        }
    }

    /// Settle an elapsed cooldown into `Eligible`, keeping the failure count.
    /// Returns true if the state changed.
    pub(crate) fn expire_cooldown(&mut self, now: Instant) -> bool {
        match self.breaker {
            BreakerState::Cooling { until } if now >= until => {
                self.breaker = BreakerState::Eligible;
                true
            }
            _ => false,
        }
    }

    /// Reset unconditionally. Returns true if the upstream had been failing.
    pub(crate) fn record_success(&mut self) -> bool {
        let was_failing =
            self.consecutive_failures > 0 || matches!(self.breaker, BreakerState::Cooling { .. });
        self.consecutive_failures = 0;
        self.breaker = BreakerState::Eligible;
        was_failing
    }

    /// Count a failure. Every failure at or past the threshold (re)arms the
    /// cooldown from `now`. Returns true when the cooldown was armed.
    pub(crate) fn record_failure(&mut self, now: Instant, threshold: u32, cooldown: Duration) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= threshold {
            self.breaker = BreakerState::Cooling { until: now + cooldown };
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let up = Upstream::new(0, "http://app1:8000/");
        assert_eq!(up.address(), "http://app1:8000");
        assert_eq!(up.url_for("/notes/1", None), "http://app1:8000/notes/1");
        assert_eq!(up.url_for("/notes", Some("")), "http://app1:8000/notes");
        assert_eq!(up.url_for("/notes", Some("a=1&b=2")), "http://app1:8000/notes?a=1&b=2");
        assert_eq!(up.url_for("health", None), "http://app1:8000/health");
    }

    #[test]
    fn test_trip_and_lazy_recovery() {
        let now = Instant::now();
        let cooldown = Duration::from_secs(5);
        let mut state = UpstreamState::new(Upstream::new(0, "http://a"));

        assert!(!state.record_failure(now, 2, cooldown));
        assert!(state.is_eligible(now));

        assert!(state.record_failure(now, 2, cooldown));
        assert_eq!(state.breaker, BreakerState::Cooling { until: now + cooldown });
        assert!(!state.is_eligible(now + Duration::from_millis(4_999)));
        assert_eq!(state.cooldown_remaining(now + Duration::from_secs(1)), Some(Duration::from_secs(4)));

        // Eligible again with no explicit reset.
        assert!(state.is_eligible(now + cooldown));
        assert_eq!(state.cooldown_remaining(now + cooldown), None);
        assert_eq!(state.consecutive_failures, 2);
    }

    #[test]
    fn test_expire_cooldown_only_after_until() {
        let now = Instant::now();
        let cooldown = Duration::from_secs(5);
        let mut state = UpstreamState::new(Upstream::new(0, "http://a"));
        assert!(!state.expire_cooldown(now));

        state.record_failure(now, 1, cooldown);
        assert!(!state.expire_cooldown(now + Duration::from_millis(4_999)));
        assert!(state.expire_cooldown(now + cooldown));
        assert_eq!(state.breaker, BreakerState::Eligible);
        assert_eq!(state.consecutive_failures, 1);
        assert!(!state.expire_cooldown(now + cooldown));
    }

    #[test]
    fn test_failure_after_expiry_rearms_immediately() {
        let now = Instant::now();
        let cooldown = Duration::from_secs(5);
        let mut state = UpstreamState::new(Upstream::new(0, "http://a"));
        state.record_failure(now, 2, cooldown);
        state.record_failure(now, 2, cooldown);

        let later = now + Duration::from_secs(6);
        assert!(state.is_eligible(later));
        assert!(state.record_failure(later, 2, cooldown));
        assert!(!state.is_eligible(later + Duration::from_secs(1)));
    }

    #[test]
    fn test_success_resets_from_any_state() {
        let now = Instant::now();
        let mut state = UpstreamState::new(Upstream::new(0, "http://a"));
        assert!(!state.record_success());

        state.record_failure(now, 1, Duration::from_secs(60));
        assert!(state.record_success());
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.breaker, BreakerState::Eligible);
        assert!(state.is_eligible(now));
    }
}
