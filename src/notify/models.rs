//! Notification payloads and delivery outcomes

use super::error::NotifyError;
use crate::classifier::{ClassificationType, FailureData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A failed test included in a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    pub test_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub classification_type: ClassificationType,
}

impl FailureEntry {
    pub fn from_failure(failure: &FailureData, classification_type: ClassificationType) -> Self {
        Self {
            test_name: failure.test_name.clone(),
            test_file: failure.test_file.clone(),
            line_number: failure.line_number,
            error_message: failure.error_message.clone(),
            stack_trace: failure.stack_trace.clone(),
            classification_type,
        }
    }
}

/// The unit of delivery to the downstream service
///
/// Serializes to the wire body of the notify endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFailureNotification {
    pub workflow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_number: Option<u64>,
    pub report_id: u64,
    pub failures: Vec<FailureEntry>,
    pub total_tests: u32,
    pub failed_tests: u32,
    pub passed_tests: u32,
    pub timestamp: DateTime<Utc>,
}

impl TestFailureNotification {
    /// Identity used for retry bookkeeping and in-flight dedup
    pub fn identity(&self) -> String {
        format!("{}:{}", self.workflow, self.report_id)
    }
}

/// Successful delivery
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReceipt {
    /// Session started by the downstream service, when it reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Flat notify outcome for hosts that report results as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<NotificationReceipt, NotifyError>> for NotificationResult {
    fn from(result: &Result<NotificationReceipt, NotifyError>) -> Self {
        match result {
            Ok(receipt) => Self {
                success: true,
                session_id: receipt.session_id.clone(),
                error: None,
            },
            Err(e) => Self {
                success: false,
                session_id: None,
                error: Some(e.to_string()),
            },
        }
    }
}

impl From<Result<NotificationReceipt, NotifyError>> for NotificationResult {
    fn from(result: Result<NotificationReceipt, NotifyError>) -> Self {
        Self::from(&result)
    }
}

/// Downstream health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
        }
    }
}

/// Response envelope of the notify endpoint
///
/// Accepts both the tRPC shape `{"result":{"data":{"sessionId":..}}}` and a
/// plain `{"sessionId":..}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NotifyResponse {
    #[serde(default)]
    result: Option<NotifyResponseResult>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotifyResponseResult {
    #[serde(default)]
    data: Option<NotifyResponseData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyResponseData {
    #[serde(default)]
    session_id: Option<String>,
}

impl NotifyResponse {
    pub(crate) fn into_session_id(self) -> Option<String> {
        self.result
            .and_then(|r| r.data)
            .and_then(|d| d.session_id)
            .or(self.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> TestFailureNotification {
        TestFailureNotification {
            workflow: "e2e".to_string(),
            run_number: Some(42),
            report_id: 7,
            failures: vec![FailureEntry {
                test_name: "logs in".to_string(),
                test_file: Some("auth.spec.ts".to_string()),
                line_number: Some(10),
                error_message: "timeout".to_string(),
                stack_trace: None,
                classification_type: ClassificationType::New,
            }],
            total_tests: 10,
            failed_tests: 1,
            passed_tests: 9,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_identity() {
        assert_eq!(sample().identity(), "e2e:7");
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["workflow"], "e2e");
        assert_eq!(value["runNumber"], 42);
        assert_eq!(value["reportId"], 7);
        assert_eq!(value["failedTests"], 1);
        assert_eq!(value["failures"][0]["classificationType"], "NEW");
        assert_eq!(value["failures"][0]["testFile"], "auth.spec.ts");
        assert!(value["failures"][0].get("stackTrace").is_none());
        assert!(value["timestamp"].as_str().unwrap().starts_with("2024-03-01T12:00:00"));
    }

    #[test]
    fn test_session_id_from_trpc_envelope() {
        let response: NotifyResponse =
            serde_json::from_str(r#"{"result":{"data":{"sessionId":"s-1"}}}"#).unwrap();
        assert_eq!(response.into_session_id(), Some("s-1".to_string()));

        let response: NotifyResponse = serde_json::from_str(r#"{"sessionId":"s-2"}"#).unwrap();
        assert_eq!(response.into_session_id(), Some("s-2".to_string()));

        let response: NotifyResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.into_session_id(), None);
    }

    #[test]
    fn test_result_from_error() {
        let result: NotificationResult = Err(NotifyError::Disabled).into();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("disabled"));
    }
}
