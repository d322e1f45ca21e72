//! Classification rules over failure history
//!
//! - NEW: no history, first occurrence, or no recorded runs
//! - PERSISTENT: failure rate above 80% or 5+ consecutive failures
//! - FLAKY: failure rate below 30%
//! - RECURRING: everything in between

use super::models::{ClassificationType, FailureHistorySnapshot};

/// Failure rate below which a failure is considered flaky
pub const FLAKY_THRESHOLD: f64 = 0.3;

/// Failure rate above which a failure is considered persistent
pub const PERSISTENT_THRESHOLD: f64 = 0.8;

/// Consecutive failures at which a failure is considered persistent
pub const CONSECUTIVE_PERSISTENT: u32 = 5;

/// Classify a failure from its history
pub fn classify(history: Option<&FailureHistorySnapshot>) -> ClassificationType {
    let history = match history {
        Some(h) if h.occurrences != 1 && h.total_runs > 0 => h,
        _ => return ClassificationType::New,
    };

    let failure_rate = f64::from(history.occurrences) / f64::from(history.total_runs);

    if failure_rate > PERSISTENT_THRESHOLD
        || history.consecutive_failures >= CONSECUTIVE_PERSISTENT
    {
        return ClassificationType::Persistent;
    }

    if failure_rate < FLAKY_THRESHOLD {
        return ClassificationType::Flaky;
    }

    ClassificationType::Recurring
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn history(
        occurrences: u32,
        total_runs: u32,
        consecutive_failures: u32,
    ) -> FailureHistorySnapshot {
        FailureHistorySnapshot {
            occurrences,
            consecutive_failures,
            total_runs,
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn test_absent_history_is_new() {
        assert_eq!(classify(None), ClassificationType::New);
    }

    #[test]
    fn test_first_occurrence_is_new() {
        for total_runs in [1, 2, 10, 1000] {
            assert_eq!(classify(Some(&history(1, total_runs, 1))), ClassificationType::New);
        }
        // consecutive count does not matter for the first occurrence
        assert_eq!(classify(Some(&history(1, 1, 9))), ClassificationType::New);
    }

    #[test]
    fn test_zero_runs_is_new() {
        assert_eq!(classify(Some(&history(4, 0, 0))), ClassificationType::New);
    }

    #[test]
    fn test_boundary_rate_is_recurring() {
        // 0.8 is not > 0.8, and 2 consecutive is below the persistent streak
        assert_eq!(classify(Some(&history(8, 10, 2))), ClassificationType::Recurring);
    }

    #[test]
    fn test_high_rate_is_persistent() {
        assert_eq!(classify(Some(&history(9, 10, 0))), ClassificationType::Persistent);
    }

    #[test]
    fn test_consecutive_streak_is_persistent() {
        for occurrences in [2, 5, 20] {
            assert_eq!(
                classify(Some(&history(occurrences, 100, 5))),
                ClassificationType::Persistent
            );
        }
    }

    #[test]
    fn test_low_rate_is_flaky() {
        assert_eq!(classify(Some(&history(2, 10, 1))), ClassificationType::Flaky);
        // exactly 0.3 is not flaky
        assert_eq!(classify(Some(&history(3, 10, 1))), ClassificationType::Recurring);
    }

    #[test]
    fn test_persistent_is_monotonic_in_occurrences() {
        let total_runs = 20;
        let mut seen_persistent = false;
        for occurrences in 2..=total_runs {
            let class = classify(Some(&history(occurrences, total_runs, 0)));
            if seen_persistent {
                assert_eq!(class, ClassificationType::Persistent, "occurrences={}", occurrences);
            }
            seen_persistent |= class == ClassificationType::Persistent;
        }
        assert!(seen_persistent);
    }
}
