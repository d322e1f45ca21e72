//! Keyed retry queue with exponential backoff
//!
//! One live entry per id. Items that exhaust their attempt budget stay in
//! the queue until the owner removes them.

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backoff and attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Ceiling for a single backoff
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(3600),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// `base_delay * 2^(attempts-1)`, capped at `max_delay`
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let multiplier = 2_u32
            .checked_pow(attempts.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }
}

/// A pending re-delivery
#[derive(Debug, Clone, Serialize)]
pub struct RetryQueueItem<T> {
    pub id: String,
    pub payload: T,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_retry_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl<T> RetryQueueItem<T> {
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at <= now && !self.is_exhausted()
    }
}

/// Retry queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryQueueStats {
    pub total: usize,
    pub ready: usize,
    pub maxed_out: usize,
}

/// Retry queue for failed deliveries
#[derive(Debug)]
pub struct RetryQueue<T> {
    items: Mutex<IndexMap<String, RetryQueueItem<T>>>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> RetryQueue<T> {
    /// Create a queue on the system clock
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            items: Mutex::new(IndexMap::new()),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Record a failed attempt for `id`, returning its attempt count
    ///
    /// A known id keeps its original payload; the error is always replaced.
    pub fn add(&self, id: impl Into<String>, payload: T, error: Option<String>) -> u32 {
        let id = id.into();
        let now = self.clock.now();
        let mut items = self.lock();

        if let Some(existing) = items.get_mut(&id) {
            existing.attempts = existing.attempts.saturating_add(1);
            existing.next_retry_at = self.schedule(now, self.policy.delay_for(existing.attempts));
            existing.error = error;
            return existing.attempts;
        }

        let next_retry_at = self.schedule(now, self.policy.base_delay);
        items.insert(
            id.clone(),
            RetryQueueItem {
                id,
                payload,
                attempts: 1,
                max_attempts: self.policy.max_attempts,
                next_retry_at,
                error,
            },
        );
        1
    }

    /// Items due for retry that still have attempts left
    pub fn get_ready(&self) -> Vec<RetryQueueItem<T>> {
        let now = self.clock.now();
        self.lock()
            .values()
            .filter(|item| item.is_ready(now))
            .cloned()
            .collect()
    }

    pub fn remove(&self, id: &str) -> Option<RetryQueueItem<T>> {
        self.lock().shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<RetryQueueItem<T>> {
        self.lock().get(id).cloned()
    }

    pub fn get_all(&self) -> Vec<RetryQueueItem<T>> {
        self.lock().values().cloned().collect()
    }

    pub fn stats(&self) -> RetryQueueStats {
        let now = self.clock.now();
        let items = self.lock();

        let mut stats = RetryQueueStats {
            total: items.len(),
            ..Default::default()
        };
        for item in items.values() {
            if item.is_exhausted() {
                stats.maxed_out += 1;
            } else if item.next_retry_at <= now {
                stats.ready += 1;
            }
        }
        stats
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn schedule(&self, now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<String, RetryQueueItem<T>>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}
