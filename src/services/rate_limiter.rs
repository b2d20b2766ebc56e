//! Sliding-window rate limiting for abuse-prone actions.
//!
//! `ActionRateLimiter` tracks attempts keyed by (action, caller), with an
//! independent `max_attempts`/`window_secs` budget per action name
//! (e.g. `"booking.request"`, `"dispatch.last_minute"`).
//!
//! State is in-memory and resets on process restart, which makes this valid
//! for single-instance deployments only. A multi-instance rollout needs the
//! same interface backed by a shared store (Redis/KV counters).
//! Share via `Arc<ActionRateLimiter>` across handler tasks.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

/// Budget for a single action name
#[derive(Debug, Clone)]
pub struct RateLimit {
    pub max_attempts: usize,
    pub window_secs: u64,
}

pub struct ActionRateLimiter {
    limits: HashMap<String, RateLimit>,
    attempts: Mutex<HashMap<(String, String), Vec<Instant>>>,
}

impl ActionRateLimiter {
    /// Build from a list of `(action, budget)` pairs.
    pub fn new(limits: Vec<(&str, RateLimit)>) -> Self {
        Self {
            limits: limits
                .into_iter()
                .map(|(action, limit)| (action.to_string(), limit))
                .collect(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Check `key` against the budget for `action`. Returns `true` if the
    /// attempt is allowed (and records it), `false` if rate-limited.
    /// Unknown actions fail open — a misconfigured limiter must not block
    /// production traffic.
    pub fn check_and_record(&self, action: &str, key: &str) -> bool {
        let Some(limit) = self.limits.get(action) else {
            warn!("ActionRateLimiter: unknown action '{}'", action);
            return true;
        };

        let mut attempts = self.attempts.lock();
        let now = Instant::now();
        let window = Duration::from_secs(limit.window_secs);

        let entry = attempts
            .entry((action.to_string(), key.to_string()))
            .or_default();
        entry.retain(|t| now.duration_since(*t) < window);

        if entry.len() >= limit.max_attempts {
            return false;
        }
        entry.push(now);
        true
    }

    /// Drop expired entries (call periodically to bound memory).
    pub fn cleanup(&self) {
        let mut attempts = self.attempts.lock();
        let now = Instant::now();
        attempts.retain(|(action, _), entries| {
            let window = self
                .limits
                .get(action)
                .map(|l| Duration::from_secs(l.window_secs))
                .unwrap_or_default();
            entries.retain(|t| now.duration_since(*t) < window);
            !entries.is_empty()
        });
    }
}
