//! CI test failure escalation
//!
//! Classifies failed tests from their run history, gates them behind
//! operator thresholds, and delivers rate-limited, retried notifications to
//! a downstream orchestration service.

pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod pipeline;

pub use classifier::{
    classify, ClassificationType, FailureData, FailureHistorySnapshot, HistoryStore,
    InMemoryHistoryStore, ThresholdCriteria, ThresholdEvaluator,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use notify::{
    IntegrationConfig, NotificationClient, NotifyError, RateLimiter, RetryQueue, RetryWorker,
    TestFailureNotification,
};
pub use pipeline::{FailureProcessor, ProcessOutcome, TestReport};
