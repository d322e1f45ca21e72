//! Rolling one-hour rate limiter for outbound notifications
//!
//! Records are pruned lazily on every check; there is no background timer.

use super::config::RateLimitConfig;
use crate::clock::{Clock, SystemClock};
use crate::metrics::METRICS;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Lookback window for both limits, in seconds
pub const WINDOW_SECS: i64 = 3600;

/// Which limit rejected a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitScope {
    Global,
    Workflow,
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Global => "global",
            RateLimitScope::Workflow => "workflow",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitRejection {
    #[error("Global rate limit exceeded ({limit} per hour)")]
    Global { limit: usize },

    #[error("Workflow rate limit exceeded ({limit} per hour for {workflow})")]
    Workflow { limit: usize, workflow: String },
}

impl RateLimitRejection {
    pub fn scope(&self) -> RateLimitScope {
        match self {
            RateLimitRejection::Global { .. } => RateLimitScope::Global,
            RateLimitRejection::Workflow { .. } => RateLimitScope::Workflow,
        }
    }
}

#[derive(Debug, Clone)]
struct NotificationRecord {
    workflow: String,
    timestamp: DateTime<Utc>,
}

/// Rate limiter statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct RateLimiterStats {
    pub total: usize,
    pub by_workflow: IndexMap<String, usize>,
}

/// Per-workflow and global notification caps over a rolling hour
#[derive(Debug)]
pub struct RateLimiter {
    records: Mutex<Vec<NotificationRecord>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter on the system clock
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check whether a notification for `workflow` may be sent now
    ///
    /// The global limit is checked first and wins the rejection reason.
    pub fn can_notify(&self, workflow: &str) -> Result<(), RateLimitRejection> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut records);

        let result = if records.len() >= self.config.global {
            Err(RateLimitRejection::Global {
                limit: self.config.global,
            })
        } else if records.iter().filter(|r| r.workflow == workflow).count()
            >= self.config.per_workflow
        {
            Err(RateLimitRejection::Workflow {
                limit: self.config.per_workflow,
                workflow: workflow.to_string(),
            })
        } else {
            Ok(())
        };

        if let Err(rejection) = &result {
            debug!("Rate limit rejected {}: {}", workflow, rejection);
            METRICS.record_rate_limit(rejection.scope().as_str());
        }

        result
    }

    /// Record a sent notification
    pub fn record_notification(&self, workflow: &str) {
        let timestamp = self.clock.now();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push(NotificationRecord {
            workflow: workflow.to_string(),
            timestamp,
        });
    }

    /// Get in-window counts, total and per workflow
    pub fn stats(&self) -> RateLimiterStats {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut records);

        let mut by_workflow = IndexMap::new();
        for record in records.iter() {
            *by_workflow.entry(record.workflow.clone()).or_insert(0) += 1;
        }

        RateLimiterStats {
            total: records.len(),
            by_workflow,
        }
    }

    /// Forget all recorded notifications
    pub fn reset(&self) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn prune(&self, records: &mut Vec<NotificationRecord>) {
        let cutoff = self.clock.now() - chrono::Duration::seconds(WINDOW_SECS);
        records.retain(|r| r.timestamp > cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn limiter(per_workflow: usize, global: usize) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::with_clock(
            RateLimitConfig {
                per_workflow,
                global,
            },
            clock.clone(),
        );
        (limiter, clock)
    }

    #[test]
    fn test_allows_under_limits() {
        let (limiter, _) = limiter(2, 5);
        assert!(limiter.can_notify("e2e").is_ok());

        limiter.record_notification("e2e");
        assert!(limiter.can_notify("e2e").is_ok());
    }

    #[test]
    fn test_per_workflow_limit() {
        let (limiter, _) = limiter(1, 5);
        limiter.record_notification("e2e");

        let rejection = limiter.can_notify("e2e").unwrap_err();
        assert_eq!(rejection.scope(), RateLimitScope::Workflow);
        assert!(rejection.to_string().contains("for e2e"));

        // other workflows are unaffected
        assert!(limiter.can_notify("unit").is_ok());
    }

    #[test]
    fn test_global_limit_takes_precedence() {
        let (limiter, _) = limiter(1, 3);
        for workflow in ["a", "b", "c"] {
            limiter.record_notification(workflow);
        }

        // "a" is over both limits; the global one is reported
        let rejection = limiter.can_notify("a").unwrap_err();
        assert_eq!(rejection, RateLimitRejection::Global { limit: 3 });
        assert_eq!(rejection.to_string(), "Global rate limit exceeded (3 per hour)");

        assert!(limiter.can_notify("fresh").is_err());
    }

    #[test]
    fn test_window_elapses() {
        let (limiter, clock) = limiter(10, 2);
        limiter.record_notification("a");
        limiter.record_notification("b");
        assert!(limiter.can_notify("c").is_err());

        clock.advance(Duration::from_secs(59 * 60));
        assert!(limiter.can_notify("c").is_err());

        clock.advance(Duration::from_secs(60));
        assert!(limiter.can_notify("c").is_ok());
        assert_eq!(limiter.stats().total, 0);
    }

    #[test]
    fn test_entry_exactly_one_hour_old_is_dropped() {
        let (limiter, clock) = limiter(1, 10);
        limiter.record_notification("a");

        clock.advance(Duration::from_secs(3600));
        assert!(limiter.can_notify("a").is_ok());
    }

    #[test]
    fn test_stats_by_workflow() {
        let (limiter, clock) = limiter(10, 10);
        limiter.record_notification("a");
        clock.advance(Duration::from_secs(30 * 60));
        limiter.record_notification("b");
        limiter.record_notification("a");

        let stats = limiter.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_workflow.get("a"), Some(&2));
        assert_eq!(stats.by_workflow.get("b"), Some(&1));

        clock.advance(Duration::from_secs(45 * 60));
        let stats = limiter.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_workflow.get("a"), Some(&1));
    }

    #[test]
    fn test_reset() {
        let (limiter, _) = limiter(1, 1);
        limiter.record_notification("a");
        limiter.reset();
        assert!(limiter.can_notify("a").is_ok());
    }
}
