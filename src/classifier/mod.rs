//! Failure classification and notification thresholds
//!
//! Turns a test's run history into a severity label and decides, per failure
//! and per batch, whether a CI failure is worth escalating:
//! - NEW / FLAKY / RECURRING / PERSISTENT classification
//! - Regex-or-glob critical and exclusion patterns
//! - Batch thresholds (minimum count, failure rate)

pub mod history;
pub mod models;
pub mod patterns;
pub mod rules;
pub mod threshold;

pub use history::{
    calculate_failure_rate, has_recovered, test_identifier, update_failure_history, HistoryStore,
    InMemoryHistoryStore,
};
pub use models::{ClassificationType, FailureData, FailureHistorySnapshot};
pub use patterns::{is_critical, is_excluded, matches_pattern, PatternSet, TestPattern};
pub use rules::classify;
pub use threshold::{
    evaluate_batch, evaluate_failure, BatchEvaluation, FailureCandidate, FailureEvaluation,
    ThresholdCriteria, ThresholdEvaluator,
};
