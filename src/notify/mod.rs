//! Escalation notification delivery
//!
//! Sends test failure notifications to the downstream orchestration service:
//! - Per-workflow and global hourly rate limits
//! - Retry queue with capped exponential backoff
//! - In-flight dedup per notification identity
//! - Health checks against the downstream service

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod rate_limiter;
pub mod retry_queue;
pub mod signing;
pub mod worker;

pub use client::{ClientStats, NotificationClient, RetrySummary};
pub use config::{IntegrationConfig, RateLimitConfig};
pub use error::NotifyError;
pub use models::{
    FailureEntry, HealthStatus, NotificationReceipt, NotificationResult, TestFailureNotification,
};
pub use rate_limiter::{RateLimitRejection, RateLimitScope, RateLimiter, RateLimiterStats};
pub use retry_queue::{RetryPolicy, RetryQueue, RetryQueueItem, RetryQueueStats};
pub use worker::RetryWorker;
