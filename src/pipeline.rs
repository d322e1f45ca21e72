//! Report processing: history → classification → thresholds → notification

use crate::classifier::{
    classify, has_recovered, test_identifier, update_failure_history, BatchEvaluation,
    FailureCandidate, FailureData, FailureHistorySnapshot, HistoryStore, ThresholdCriteria,
    ThresholdEvaluator,
};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::notify::{
    FailureEntry, NotificationClient, NotificationReceipt, NotifyError, TestFailureNotification,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Failures from one CI test run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub workflow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_number: Option<u64>,
    pub report_id: u64,
    pub total_tests: u32,
    #[serde(default)]
    pub failures: Vec<FailureData>,
}

/// What happened to a processed report
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The report had no failures
    NoFailures,
    /// Thresholds were not met
    Suppressed { evaluation: BatchEvaluation },
    /// Notification delivered
    Notified {
        notification: TestFailureNotification,
        receipt: NotificationReceipt,
    },
    /// Notification built but not delivered
    NotDelivered {
        notification: TestFailureNotification,
        error: NotifyError,
    },
}

/// Drives a report through history bookkeeping and escalation
pub struct FailureProcessor {
    history: Arc<dyn HistoryStore>,
    client: Arc<NotificationClient>,
    evaluator: RwLock<Arc<ThresholdEvaluator>>,
    clock: Arc<dyn Clock>,
}

impl FailureProcessor {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        client: Arc<NotificationClient>,
        criteria: ThresholdCriteria,
    ) -> Self {
        Self::with_clock(history, client, criteria, Arc::new(SystemClock))
    }

    pub fn with_clock(
        history: Arc<dyn HistoryStore>,
        client: Arc<NotificationClient>,
        criteria: ThresholdCriteria,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            history,
            client,
            evaluator: RwLock::new(Arc::new(ThresholdEvaluator::new(criteria))),
            clock,
        }
    }

    pub fn client(&self) -> &Arc<NotificationClient> {
        &self.client
    }

    /// Replace the threshold criteria for subsequent reports
    pub fn set_criteria(&self, criteria: ThresholdCriteria) {
        let evaluator = Arc::new(ThresholdEvaluator::new(criteria));
        *self.evaluator.write().unwrap_or_else(|e| e.into_inner()) = evaluator;
    }

    pub fn criteria(&self) -> ThresholdCriteria {
        self.evaluator().criteria().clone()
    }

    fn evaluator(&self) -> Arc<ThresholdEvaluator> {
        self.evaluator
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Record the report's failures and escalate them if thresholds are met
    pub async fn process_report(&self, report: &TestReport) -> Result<ProcessOutcome> {
        if report.failures.is_empty() {
            debug!("Report {}:{} has no failures", report.workflow, report.report_id);
            return Ok(ProcessOutcome::NoFailures);
        }

        let now = self.clock.now();
        let mut candidates = Vec::with_capacity(report.failures.len());

        for failure in &report.failures {
            let test_id = failure.identifier();
            let previous = self.history.load(&test_id).await?;
            let updated = update_failure_history(previous.as_ref(), true, now);
            self.history.save(&test_id, updated.clone()).await?;
            candidates.push(FailureCandidate::new(failure.test_name.clone(), Some(updated)));
        }

        let evaluation = self.evaluator().evaluate_batch(&candidates);
        info!(
            "Threshold evaluation for {}:{}: trigger={} ({})",
            report.workflow, report.report_id, evaluation.should_trigger, evaluation.reason
        );

        if !evaluation.should_trigger {
            return Ok(ProcessOutcome::Suppressed { evaluation });
        }

        let failures: Vec<FailureEntry> = report
            .failures
            .iter()
            .zip(&candidates)
            .filter(|(failure, _)| evaluation.notifiable_failures.contains(&failure.test_name))
            .map(|(failure, candidate)| {
                FailureEntry::from_failure(failure, classify(candidate.history.as_ref()))
            })
            .collect();

        let failed_tests = u32::try_from(report.failures.len()).unwrap_or(u32::MAX);
        let notification = TestFailureNotification {
            workflow: report.workflow.clone(),
            run_number: report.run_number,
            report_id: report.report_id,
            failures,
            total_tests: report.total_tests,
            failed_tests,
            passed_tests: report.total_tests.saturating_sub(failed_tests),
            timestamp: now,
        };

        match self.client.notify(&notification).await {
            Ok(receipt) => Ok(ProcessOutcome::Notified {
                notification,
                receipt,
            }),
            Err(error) => {
                warn!("Failed to send notification {}: {}", notification.identity(), error);
                Ok(ProcessOutcome::NotDelivered {
                    notification,
                    error,
                })
            }
        }
    }

    /// Record a passing run for a test that already has history
    ///
    /// Tests never seen failing are not tracked.
    pub async fn record_pass(
        &self,
        test_name: &str,
        test_file: Option<&str>,
    ) -> Result<Option<FailureHistorySnapshot>> {
        let test_id = test_identifier(test_name, test_file);
        let previous = match self.history.load(&test_id).await? {
            Some(previous) => previous,
            None => return Ok(None),
        };

        if has_recovered(previous.consecutive_failures, false) {
            info!(
                "Test {} recovered after {} consecutive failures",
                test_id, previous.consecutive_failures
            );
        }

        let updated = update_failure_history(Some(&previous), false, self.clock.now());
        self.history.save(&test_id, updated.clone()).await?;
        Ok(Some(updated))
    }
}
