//! Data models for failure classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity label derived from a test's failure history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationType {
    /// First time this failure has been seen
    New,
    /// Intermittent, low failure rate
    Flaky,
    /// Fails regularly but not consistently
    Recurring,
    /// Fails nearly every run or many runs in a row
    Persistent,
}

impl ClassificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationType::New => "NEW",
            ClassificationType::Flaky => "FLAKY",
            ClassificationType::Recurring => "RECURRING",
            ClassificationType::Persistent => "PERSISTENT",
        }
    }
}

impl fmt::Display for ClassificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run counters for a single test identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureHistorySnapshot {
    pub occurrences: u32,
    pub consecutive_failures: u32,
    pub total_runs: u32,
    pub last_seen: DateTime<Utc>,
}

/// A single failed test as reported by a CI run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureData {
    pub test_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl FailureData {
    pub fn new(test_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            test_file: None,
            line_number: None,
            error_message: error_message.into(),
            stack_trace: None,
        }
    }

    pub fn with_location(mut self, test_file: impl Into<String>, line_number: Option<u32>) -> Self {
        self.test_file = Some(test_file.into());
        self.line_number = line_number;
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_wire_format() {
        let json = serde_json::to_string(&ClassificationType::Persistent).unwrap();
        assert_eq!(json, "\"PERSISTENT\"");

        let parsed: ClassificationType = serde_json::from_str("\"FLAKY\"").unwrap();
        assert_eq!(parsed, ClassificationType::Flaky);
    }

    #[test]
    fn test_failure_data_omits_empty_fields() {
        let failure = FailureData::new("login works", "expected 200");
        let value = serde_json::to_value(&failure).unwrap();

        assert_eq!(value["testName"], "login works");
        assert!(value.get("testFile").is_none());
        assert!(value.get("stackTrace").is_none());
    }
}
