//! Sliding-window attempt throttling keyed by client identifier.
//!
//! The policy is pure; attempt records live in an injected [`RateLimitStore`].
//! [`InMemoryRateLimitStore`] is process-local: each instance of a
//! multi-process deployment keeps its own view, and state is lost on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Attempt counter for one identifier within its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub count: u32,
    pub first_attempt: DateTime<Utc>,
    pub last_attempt: DateTime<Utc>,
}

impl AttemptRecord {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            first_attempt: now,
            last_attempt: now,
        }
    }
}

/// Storage for attempt records.
pub trait RateLimitStore: Send + Sync {
    fn load(&self, identifier: &str) -> Option<AttemptRecord>;

    /// Replace the identifier's record with `update(current)` as one atomic
    /// step; concurrent callers observe each other's writes.
    fn record_attempt(
        &self,
        identifier: &str,
        update: &mut dyn FnMut(Option<AttemptRecord>) -> AttemptRecord,
    ) -> AttemptRecord;

    fn remove(&self, identifier: &str);
}

impl<S> RateLimitStore for Arc<S>
where
    S: RateLimitStore + ?Sized,
{
    fn load(&self, identifier: &str) -> Option<AttemptRecord> {
        (**self).load(identifier)
    }

    fn record_attempt(
        &self,
        identifier: &str,
        update: &mut dyn FnMut(Option<AttemptRecord>) -> AttemptRecord,
    ) -> AttemptRecord {
        (**self).record_attempt(identifier, update)
    }

    fn remove(&self, identifier: &str) {
        (**self).remove(identifier)
    }
}

/// In-memory attempt store for single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    inner: Mutex<HashMap<String, AttemptRecord>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop records whose window closed before `now`.
    pub fn purge_expired(&self, window: chrono::Duration, now: DateTime<Utc>) {
        if let Ok(mut map) = self.inner.lock() {
            map.retain(|_, record| now - record.first_attempt <= window);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn load(&self, identifier: &str) -> Option<AttemptRecord> {
        let map = self.inner.lock().ok()?;
        map.get(identifier).copied()
    }

    fn record_attempt(
        &self,
        identifier: &str,
        update: &mut dyn FnMut(Option<AttemptRecord>) -> AttemptRecord,
    ) -> AttemptRecord {
        // Poisoning leaves records intact.
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = update(map.get(identifier).copied());
        map.insert(identifier.to_string(), record);
        record
    }

    fn remove(&self, identifier: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(identifier);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u32,
    pub window: chrono::Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: chrono::Duration::minutes(15),
        }
    }
}

/// Rejection carrying how long the caller should wait.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("too many attempts; retry after {retry_after:?}")]
pub struct RateLimited {
    pub retry_after: Duration,
}

#[derive(Debug)]
pub struct RateLimiter<S> {
    store: S,
    policy: RateLimitPolicy,
}

impl<S> RateLimiter<S> {
    pub fn new(store: S, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    /// Record an attempt with the policy's default limit.
    pub fn is_rate_limited(&self, identifier: &str, now: DateTime<Utc>) -> bool {
        self.is_rate_limited_with(identifier, self.policy.max_attempts, now)
    }

    /// Record an attempt and report whether it must be rejected.
    ///
    /// Admitted attempts increment the counter; the attempt after the
    /// `max_attempts`-th admitted one within the window is rejected. Rejected
    /// attempts do not extend the window.
    pub fn is_rate_limited_with(&self, identifier: &str, max_attempts: u32, now: DateTime<Utc>) -> bool {
        let window = self.policy.window;
        let mut limited = false;
        self.store.record_attempt(identifier, &mut |current| {
            let mut record = match current {
                Some(record) if now - record.first_attempt <= window => record,
                _ => AttemptRecord::fresh(now),
            };
            record.last_attempt = now;
            limited = record.count >= max_attempts;
            if !limited {
                record.count += 1;
            }
            record
        });

        limited
    }

    /// Time until the identifier's window closes (zero when not tracked).
    pub fn remaining_time(&self, identifier: &str, now: DateTime<Utc>) -> Duration {
        let Some(record) = self.store.load(identifier) else {
            return Duration::ZERO;
        };
        let remaining = self.policy.window - (now - record.first_attempt);
        remaining.to_std().unwrap_or(Duration::ZERO)
    }

    /// Record an attempt, returning the retry delay when rejected.
    pub fn check(&self, identifier: &str, now: DateTime<Utc>) -> Result<(), RateLimited> {
        if self.is_rate_limited(identifier, now) {
            Err(RateLimited {
                retry_after: self.remaining_time(identifier, now),
            })
        } else {
            Ok(())
        }
    }

    /// Clear the identifier's counter (called after a successful authentication).
    pub fn reset(&self, identifier: &str) {
        self.store.remove(identifier);
    }
}
