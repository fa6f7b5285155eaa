//! Rate Limiter (§4.6): three bucketed sliding windows (minute/hour/day)
//! per caller identifier, with role-tier caps and a background eviction
//! sweep.
//!
//! Teacher grounding: `dashmap` backs the top-level counter maps exactly
//! as the contract specifies ("a concurrent map... each counter's
//! mutation is a single atomic/sharded-lock operation, not a coarse
//! global lock"); the sweep-task shape mirrors the orchestrator's own
//! spawned-task pattern.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::error::RateLimitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Premium,
    Pro,
    User,
}

/// Identifier reserved for callers with neither an authenticated user nor
/// a client IP attributed to the request.
pub const GLOBAL_IDENTIFIER: &str = "global";

/// Deployment-fixed toggles controlling which attribute a caller's quota
/// is keyed on (§4.6 "Identifier selection policy"). Both may be enabled
/// at once; precedence is user, then IP, then the global bucket.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierPolicy {
    pub enable_per_user: bool,
    pub enable_per_ip: bool,
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self {
            enable_per_user: true,
            enable_per_ip: true,
        }
    }
}

/// Resolves the identifier `RateLimiter::allow` should be called with:
/// the authenticated user id when `enable_per_user` is set and one is
/// present, else the client IP when `enable_per_ip` is set and one is
/// present, else the fixed [`GLOBAL_IDENTIFIER`] bucket shared by every
/// caller the policy can't otherwise distinguish.
pub fn select_identifier(
    auth_user: Option<&str>,
    client_ip: Option<&str>,
    policy: &IdentifierPolicy,
) -> String {
    if policy.enable_per_user {
        if let Some(user) = auth_user {
            return user.to_owned();
        }
    }
    if policy.enable_per_ip {
        if let Some(ip) = client_ip {
            return ip.to_owned();
        }
    }
    GLOBAL_IDENTIFIER.to_owned()
}

#[derive(Debug, Clone, Copy)]
struct Caps {
    per_minute: u32,
    per_hour: u32,
    per_day: u32,
}

fn caps_for(role: Role) -> Caps {
    match role {
        Role::Admin => Caps { per_minute: 600, per_hour: 10_000, per_day: 100_000 },
        Role::Premium => Caps { per_minute: 300, per_hour: 5_000, per_day: 50_000 },
        Role::Pro => Caps { per_minute: 180, per_hour: 3_000, per_day: 30_000 },
        Role::User => Caps { per_minute: 60, per_hour: 1_000, per_day: 10_000 },
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// One bucketed window (`floor(now / span_secs)` per the contract),
/// keyed by caller identifier. A bucket counts whatever requests landed
/// within it; once the current bucket rolls over, the previous count is
/// stale and is replaced rather than accumulated.
struct Window {
    span_secs: u64,
    cap_of: fn(Caps) -> u32,
    counters: DashMap<String, (u64, u32)>,
}

impl Window {
    fn new(span_secs: u64, cap_of: fn(Caps) -> u32) -> Self {
        Self { span_secs, cap_of, counters: DashMap::new() }
    }

    /// Increments the bucket for `identifier` at `now`, returning
    /// `(count_after_increment, cap, reset_in)`.
    fn increment(&self, identifier: &str, caps: Caps, now: u64) -> (u32, u32, Duration) {
        let bucket = now / self.span_secs;
        let cap = (self.cap_of)(caps);
        let mut entry = self.counters.entry(identifier.to_owned()).or_insert((bucket, 0));
        if entry.0 != bucket {
            *entry = (bucket, 0);
        }
        entry.1 += 1;
        let bucket_end = (bucket + 1) * self.span_secs;
        let reset_in = Duration::from_secs(bucket_end.saturating_sub(now));
        (entry.1, cap, reset_in)
    }

    /// Drops any bucket more than one full window stale relative to `now`
    /// (§5: eviction removes counters whose reset passed more than one
    /// window ago).
    fn sweep(&self, now: u64) {
        let current_bucket = now / self.span_secs;
        self.counters.retain(|_, (bucket, _)| current_bucket.saturating_sub(*bucket) <= 1);
    }
}

const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
pub struct Quota {
    pub allowed: bool,
    pub remaining_minute: u32,
    pub remaining_hour: u32,
    pub remaining_day: u32,
    pub reset_in: Duration,
}

/// Identifiers in the whitelist, and the reserved health-probe identifier,
/// never consume quota (§4.6).
pub struct RateLimiter {
    minute: Window,
    hour: Window,
    day: Window,
    whitelist: DashMap<String, ()>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            minute: Window::new(60, |c| c.per_minute),
            hour: Window::new(3600, |c| c.per_hour),
            day: Window::new(86_400, |c| c.per_day),
            whitelist: DashMap::new(),
        }
    }

    pub fn whitelist(&self, identifier: impl Into<String>) {
        self.whitelist.insert(identifier.into(), ());
    }

    /// Checks and records one request for `identifier` under `role`'s caps.
    /// Health probes and whitelisted callers always pass and never consume
    /// quota. Every counter is incremented unconditionally (the contract:
    /// "atomically increment... and compare"), so a denied request still
    /// counts against the window it overflowed.
    pub fn allow(&self, identifier: &str, role: Role) -> Result<Quota, RateLimitError> {
        if identifier == "__health__" || self.whitelist.contains_key(identifier) {
            return Ok(Quota {
                allowed: true,
                remaining_minute: u32::MAX,
                remaining_hour: u32::MAX,
                remaining_day: u32::MAX,
                reset_in: Duration::ZERO,
            });
        }

        let caps = caps_for(role);
        let now = now_secs();

        let (minute_count, minute_cap, minute_reset) = self.minute.increment(identifier, caps, now);
        let (hour_count, hour_cap, hour_reset) = self.hour.increment(identifier, caps, now);
        let (day_count, day_cap, day_reset) = self.day.increment(identifier, caps, now);

        let over_minute = minute_count > minute_cap;
        let over_hour = hour_count > hour_cap;
        let over_day = day_count > day_cap;

        if over_minute || over_hour || over_day {
            let retry_after = [
                over_minute.then_some(minute_reset),
                over_hour.then_some(hour_reset),
                over_day.then_some(day_reset),
            ]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or_default();
            return Err(RateLimitError::Exceeded {
                identifier: identifier.to_owned(),
                retry_after,
            });
        }

        Ok(Quota {
            allowed: true,
            remaining_minute: minute_cap - minute_count,
            remaining_hour: hour_cap - hour_count,
            remaining_day: day_cap - day_count,
            reset_in: minute_reset,
        })
    }

    fn sweep(&self) {
        let now = now_secs();
        self.minute.sweep(now);
        self.hour.sweep(now);
        self.day.sweep(now);
    }

    /// Spawns the periodic eviction sweep. Intended to be called once at
    /// startup against an `Arc<RateLimiter>`.
    pub fn spawn_sweeper(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_the_highest_caps() {
        let admin = caps_for(Role::Admin);
        let user = caps_for(Role::User);
        assert!(admin.per_minute > user.per_minute);
        assert!(admin.per_day > user.per_day);
    }

    #[test]
    fn allows_requests_under_the_per_minute_cap() {
        let limiter = RateLimiter::new();
        for _ in 0..caps_for(Role::User).per_minute {
            assert!(limiter.allow("caller-a", Role::User).unwrap().allowed);
        }
    }

    #[test]
    fn rejects_the_request_that_exceeds_the_per_minute_cap() {
        let limiter = RateLimiter::new();
        let cap = caps_for(Role::User).per_minute;
        for _ in 0..cap {
            limiter.allow("caller-b", Role::User).unwrap();
        }
        let result = limiter.allow("caller-b", Role::User);
        assert!(matches!(result, Err(RateLimitError::Exceeded { .. })));
    }

    #[test]
    fn whitelisted_callers_bypass_every_cap() {
        let limiter = RateLimiter::new();
        limiter.whitelist("trusted");
        for _ in 0..(caps_for(Role::User).per_minute * 2) {
            assert!(limiter.allow("trusted", Role::User).unwrap().allowed);
        }
    }

    #[test]
    fn health_probe_identifier_always_bypasses() {
        let limiter = RateLimiter::new();
        for _ in 0..10_000 {
            assert!(limiter.allow("__health__", Role::User).unwrap().allowed);
        }
    }

    #[test]
    fn independent_identifiers_have_independent_quotas() {
        let limiter = RateLimiter::new();
        let cap = caps_for(Role::User).per_minute;
        for _ in 0..cap {
            limiter.allow("caller-c", Role::User).unwrap();
        }
        assert!(limiter.allow("caller-d", Role::User).unwrap().allowed);
    }

    #[test]
    fn sweep_keeps_the_current_buckets_fresh() {
        let limiter = RateLimiter::new();
        limiter.allow("caller-e", Role::User).unwrap();
        assert_eq!(limiter.minute.counters.len(), 1);
        limiter.sweep();
        assert_eq!(limiter.minute.counters.len(), 1);
    }

    #[test]
    fn selects_the_authenticated_user_over_the_client_ip() {
        let policy = IdentifierPolicy::default();
        assert_eq!(select_identifier(Some("user-1"), Some("1.2.3.4"), &policy), "user-1");
    }

    #[test]
    fn falls_back_to_client_ip_when_no_user_is_authenticated() {
        let policy = IdentifierPolicy::default();
        assert_eq!(select_identifier(None, Some("1.2.3.4"), &policy), "1.2.3.4");
    }

    #[test]
    fn falls_back_to_the_global_bucket_when_neither_is_known() {
        let policy = IdentifierPolicy::default();
        assert_eq!(select_identifier(None, None, &policy), GLOBAL_IDENTIFIER);
    }

    #[test]
    fn disabling_per_user_skips_straight_to_the_client_ip() {
        let policy = IdentifierPolicy { enable_per_user: false, enable_per_ip: true };
        assert_eq!(select_identifier(Some("user-1"), Some("1.2.3.4"), &policy), "1.2.3.4");
    }

    #[test]
    fn disabling_both_toggles_always_yields_the_global_bucket() {
        let policy = IdentifierPolicy { enable_per_user: false, enable_per_ip: false };
        assert_eq!(select_identifier(Some("user-1"), Some("1.2.3.4"), &policy), GLOBAL_IDENTIFIER);
    }

    #[test]
    fn remaining_counts_down_as_requests_are_recorded() {
        let limiter = RateLimiter::new();
        let first = limiter.allow("caller-f", Role::User).unwrap();
        let second = limiter.allow("caller-f", Role::User).unwrap();
        assert_eq!(first.remaining_minute, second.remaining_minute + 1);
    }
}
