//! TTL cache primitives.
//!
//! Cache expiry is an explicit `{value, expires_at}` cell checked against an
//! injected clock, so TTL behavior is testable without wall-clock reads.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Source of "now" for TTL checks.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A cached value with an absolute expiry instant.
#[derive(Debug, Clone)]
pub struct TtlCell<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> TtlCell<T> {
    /// Wrap `value`, expiring `ttl` after `now`.
    pub fn new(value: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        Self {
            value,
            expires_at: now + ttl,
        }
    }

    /// Pure expiry predicate.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Shared handle to an injectable clock.
pub type SharedClock = Arc<dyn Clock>;
