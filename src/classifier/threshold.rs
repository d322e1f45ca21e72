//! Threshold evaluation for per-failure and per-batch notification decisions

use super::models::{ClassificationType, FailureHistorySnapshot};
use super::patterns::PatternSet;
use super::rules::classify;
use crate::metrics::METRICS;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Operator-configured notification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdCriteria {
    /// Master switch for failure notifications
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Minimum notifiable failures in a batch
    #[serde(default = "default_min_failed_tests")]
    pub min_failed_tests: usize,

    /// Minimum share of notifiable failures in the batch, 0-100 (0 disables)
    #[serde(default)]
    pub failure_rate: f64,

    /// Notify on flaky failures
    #[serde(default)]
    pub include_flaky: bool,

    /// Only notify on new failures (recurring and persistent are skipped)
    #[serde(default = "default_only_new_failures")]
    pub only_new_failures: bool,

    /// Tests that always notify (regex or glob)
    #[serde(default)]
    pub critical_test_patterns: Vec<String>,

    /// Tests that never notify (regex or glob)
    #[serde(default)]
    pub exclude_test_patterns: Vec<String>,
}

fn default_enabled() -> bool { true }
fn default_min_failed_tests() -> usize { 1 }
fn default_only_new_failures() -> bool { true }

impl Default for ThresholdCriteria {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            min_failed_tests: default_min_failed_tests(),
            failure_rate: 0.0,
            include_flaky: false,
            only_new_failures: default_only_new_failures(),
            critical_test_patterns: vec![],
            exclude_test_patterns: vec![],
        }
    }
}

/// Decision for a single failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEvaluation {
    pub classification: ClassificationType,
    pub should_notify: bool,
    pub reason: String,
}

/// A failure awaiting batch evaluation
#[derive(Debug, Clone)]
pub struct FailureCandidate {
    pub test_name: String,
    pub history: Option<FailureHistorySnapshot>,
}

impl FailureCandidate {
    pub fn new(test_name: impl Into<String>, history: Option<FailureHistorySnapshot>) -> Self {
        Self {
            test_name: test_name.into(),
            history,
        }
    }
}

/// Decision for a whole batch of failures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEvaluation {
    pub should_trigger: bool,
    pub reason: String,
    pub failure_count: usize,
    pub notifiable_failures: Vec<String>,
}

/// Evaluates failures against one set of criteria, with patterns compiled once
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    criteria: ThresholdCriteria,
    critical: PatternSet,
    exclude: PatternSet,
}

impl ThresholdEvaluator {
    pub fn new(criteria: ThresholdCriteria) -> Self {
        let critical = PatternSet::new(&criteria.critical_test_patterns);
        let exclude = PatternSet::new(&criteria.exclude_test_patterns);
        Self {
            criteria,
            critical,
            exclude,
        }
    }

    pub fn criteria(&self) -> &ThresholdCriteria {
        &self.criteria
    }

    /// Decide whether a single failure is notifiable
    pub fn evaluate_failure(
        &self,
        history: Option<&FailureHistorySnapshot>,
        test_name: &str,
    ) -> FailureEvaluation {
        let classification = classify(history);
        METRICS.record_evaluation(classification);

        if self.exclude.matches_any(test_name) {
            return FailureEvaluation {
                classification,
                should_notify: false,
                reason: "Test matches exclusion pattern".to_string(),
            };
        }

        if self.critical.matches_any(test_name) {
            return FailureEvaluation {
                classification,
                should_notify: true,
                reason: "Critical test failure".to_string(),
            };
        }

        let only_new = self.criteria.only_new_failures;
        let (should_notify, reason) = match classification {
            ClassificationType::New => (true, "New failure detected"),
            ClassificationType::Flaky if self.criteria.include_flaky => {
                (true, "Flaky test failure")
            }
            ClassificationType::Flaky => (false, "Flaky test (notifications disabled)"),
            ClassificationType::Recurring if only_new => {
                (false, "Recurring failure (only new failures enabled)")
            }
            ClassificationType::Recurring => (true, "Recurring failure detected"),
            ClassificationType::Persistent if only_new => {
                (false, "Persistent failure (only new failures enabled)")
            }
            ClassificationType::Persistent => (true, "Persistent failure detected"),
        };

        FailureEvaluation {
            classification,
            should_notify,
            reason: reason.to_string(),
        }
    }

    /// Decide whether a batch of failures should trigger a notification
    pub fn evaluate_batch(&self, failures: &[FailureCandidate]) -> BatchEvaluation {
        let failure_count = failures.len();

        if !self.criteria.enabled {
            return BatchEvaluation {
                should_trigger: false,
                reason: "Notifications disabled".to_string(),
                failure_count,
                notifiable_failures: vec![],
            };
        }

        let notifiable_failures: Vec<String> = failures
            .iter()
            .filter(|f| {
                let evaluation = self.evaluate_failure(f.history.as_ref(), &f.test_name);
                debug!(
                    "Evaluated {}: {} notify={} ({})",
                    f.test_name,
                    evaluation.classification,
                    evaluation.should_notify,
                    evaluation.reason
                );
                evaluation.should_notify
            })
            .map(|f| f.test_name.clone())
            .collect();

        if notifiable_failures.len() < self.criteria.min_failed_tests {
            return BatchEvaluation {
                should_trigger: false,
                reason: format!(
                    "Only {} notifiable failures (minimum: {})",
                    notifiable_failures.len(),
                    self.criteria.min_failed_tests
                ),
                failure_count,
                notifiable_failures,
            };
        }

        if self.criteria.failure_rate > 0.0 {
            let actual_rate = if failure_count == 0 {
                0.0
            } else {
                notifiable_failures.len() as f64 / failure_count as f64 * 100.0
            };

            if actual_rate < self.criteria.failure_rate {
                return BatchEvaluation {
                    should_trigger: false,
                    reason: format!(
                        "Failure rate {:.1}% below threshold {}%",
                        actual_rate, self.criteria.failure_rate
                    ),
                    failure_count,
                    notifiable_failures,
                };
            }
        }

        BatchEvaluation {
            should_trigger: true,
            reason: format!(
                "{} notifiable failures meet threshold criteria",
                notifiable_failures.len()
            ),
            failure_count,
            notifiable_failures,
        }
    }
}

/// Evaluate a single failure against criteria
pub fn evaluate_failure(
    history: Option<&FailureHistorySnapshot>,
    test_name: &str,
    criteria: &ThresholdCriteria,
) -> FailureEvaluation {
    ThresholdEvaluator::new(criteria.clone()).evaluate_failure(history, test_name)
}

/// Evaluate a batch of failures against criteria
pub fn evaluate_batch(
    failures: &[FailureCandidate],
    criteria: &ThresholdCriteria,
) -> BatchEvaluation {
    ThresholdEvaluator::new(criteria.clone()).evaluate_batch(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn history(
        occurrences: u32,
        total_runs: u32,
        consecutive_failures: u32,
    ) -> Option<FailureHistorySnapshot> {
        Some(FailureHistorySnapshot {
            occurrences,
            consecutive_failures,
            total_runs,
            last_seen: Utc::now(),
        })
    }

    fn flaky() -> Option<FailureHistorySnapshot> {
        history(2, 10, 1)
    }

    fn persistent() -> Option<FailureHistorySnapshot> {
        history(10, 10, 10)
    }

    #[test]
    fn test_default_criteria() {
        let criteria = ThresholdCriteria::default();
        assert!(criteria.enabled);
        assert_eq!(criteria.min_failed_tests, 1);
        assert_eq!(criteria.failure_rate, 0.0);
        assert!(!criteria.include_flaky);
        assert!(criteria.only_new_failures);
    }

    #[test]
    fn test_flaky_not_notified_when_disabled() {
        let criteria = ThresholdCriteria::default();
        let result = evaluate_failure(flaky().as_ref(), "cart updates", &criteria);

        assert_eq!(result.classification, ClassificationType::Flaky);
        assert!(!result.should_notify);
        assert!(result.reason.to_lowercase().contains("flaky"));
        assert!(result.reason.contains("disabled"));
    }

    #[test]
    fn test_flaky_notified_when_included() {
        let criteria = ThresholdCriteria {
            include_flaky: true,
            ..Default::default()
        };
        assert!(evaluate_failure(flaky().as_ref(), "cart updates", &criteria).should_notify);
    }

    #[test]
    fn test_new_failure_notifies() {
        let result = evaluate_failure(None, "brand new", &ThresholdCriteria::default());
        assert_eq!(result.classification, ClassificationType::New);
        assert!(result.should_notify);
    }

    #[test]
    fn test_only_new_failures_gates_recurring_and_persistent() {
        let strict = ThresholdCriteria::default();
        let relaxed = ThresholdCriteria {
            only_new_failures: false,
            ..Default::default()
        };

        for h in [history(5, 10, 1), persistent()] {
            assert!(!evaluate_failure(h.as_ref(), "t", &strict).should_notify);
            assert!(evaluate_failure(h.as_ref(), "t", &relaxed).should_notify);
        }
    }

    #[test]
    fn test_exclusion_beats_criticality() {
        let criteria = ThresholdCriteria {
            critical_test_patterns: vec!["checkout".to_string()],
            exclude_test_patterns: vec!["*checkout*".to_string()],
            ..Default::default()
        };
        let result = evaluate_failure(None, "slow checkout", &criteria);

        assert!(!result.should_notify);
        assert_eq!(result.reason, "Test matches exclusion pattern");
        assert_eq!(result.classification, ClassificationType::New);
    }

    #[test]
    fn test_critical_overrides_classification() {
        let criteria = ThresholdCriteria {
            critical_test_patterns: vec!["^payments".to_string()],
            ..Default::default()
        };
        let result = evaluate_failure(persistent().as_ref(), "payments capture", &criteria);

        assert_eq!(result.classification, ClassificationType::Persistent);
        assert!(result.should_notify);
        assert_eq!(result.reason, "Critical test failure");
    }

    #[test]
    fn test_batch_disabled_never_triggers() {
        let criteria = ThresholdCriteria {
            enabled: false,
            min_failed_tests: 0,
            ..Default::default()
        };
        let failures = vec![FailureCandidate::new("a", None), FailureCandidate::new("b", None)];
        let result = evaluate_batch(&failures, &criteria);

        assert!(!result.should_trigger);
        assert!(result.notifiable_failures.is_empty());
        assert_eq!(result.failure_count, 2);
    }

    #[test]
    fn test_batch_minimum_failed_tests() {
        let criteria = ThresholdCriteria {
            min_failed_tests: 2,
            ..Default::default()
        };
        let failures = vec![
            FailureCandidate::new("new one", None),
            FailureCandidate::new("flaky one", flaky()),
        ];
        let result = evaluate_batch(&failures, &criteria);

        assert!(!result.should_trigger);
        assert_eq!(result.notifiable_failures, vec!["new one".to_string()]);
        assert!(result.reason.contains("minimum: 2"));
    }

    #[test]
    fn test_batch_failure_rate_threshold() {
        let criteria = ThresholdCriteria {
            failure_rate: 60.0,
            ..Default::default()
        };
        let failures = vec![
            FailureCandidate::new("new one", None),
            FailureCandidate::new("flaky one", flaky()),
        ];
        let result = evaluate_batch(&failures, &criteria);

        assert!(!result.should_trigger);
        assert!(result.reason.contains("50.0%"));

        let lenient = ThresholdCriteria {
            failure_rate: 50.0,
            ..Default::default()
        };
        assert!(evaluate_batch(&failures, &lenient).should_trigger);
    }

    #[test]
    fn test_batch_triggers_with_notifiable_subset() {
        let failures = vec![
            FailureCandidate::new("new one", None),
            FailureCandidate::new("flaky one", flaky()),
            FailureCandidate::new("another new", history(1, 3, 1)),
        ];
        let result = evaluate_batch(&failures, &ThresholdCriteria::default());

        assert!(result.should_trigger);
        assert_eq!(
            result.notifiable_failures,
            vec!["new one".to_string(), "another new".to_string()]
        );
    }

    #[test]
    fn test_empty_batch_with_rate_does_not_trigger() {
        let criteria = ThresholdCriteria {
            min_failed_tests: 0,
            failure_rate: 10.0,
            ..Default::default()
        };
        assert!(!evaluate_batch(&[], &criteria).should_trigger);
    }

    #[test]
    fn test_criteria_deserializes_with_defaults() {
        let criteria: ThresholdCriteria = serde_json::from_str(
            r#"{"include_flaky": true, "exclude_test_patterns": ["wip"]}"#,
        )
        .unwrap();

        assert!(criteria.enabled);
        assert!(criteria.include_flaky);
        assert!(criteria.only_new_failures);
        assert_eq!(criteria.exclude_test_patterns, vec!["wip".to_string()]);
    }
}
