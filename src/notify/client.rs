//! Notification client orchestrating rate limiting, delivery, and retries

use super::config::IntegrationConfig;
use super::error::NotifyError;
use super::models::{HealthStatus, NotificationReceipt, NotifyResponse, TestFailureNotification};
use super::rate_limiter::{RateLimiter, RateLimiterStats};
use super::retry_queue::{RetryPolicy, RetryQueue, RetryQueueStats};
use super::signing::{sign_body, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::metrics::METRICS;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of one retry queue drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetrySummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Removed after exhausting their attempts
    pub dropped: usize,
    /// Left queued because the same identity was already being delivered
    pub skipped: usize,
}

/// Combined limiter and queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub rate_limiter: RateLimiterStats,
    pub retry_queue: RetryQueueStats,
}

/// Result of one delivery attempt
struct Attempt {
    result: std::result::Result<NotificationReceipt, NotifyError>,
    /// The failure used the last attempt and the entry was removed
    dropped: bool,
}

impl From<NotifyError> for Attempt {
    fn from(error: NotifyError) -> Self {
        Self {
            result: Err(error),
            dropped: false,
        }
    }
}

/// Marks an identity as in flight until dropped
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, id: &str) -> Option<Self> {
        let mut ids = set.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(id.to_string()) {
            return None;
        }
        Some(Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

/// Delivers failure notifications to the downstream orchestration service
pub struct NotificationClient {
    http: Client,
    config: IntegrationConfig,
    rate_limiter: RateLimiter,
    retry_queue: RetryQueue<TestFailureNotification>,
    in_flight: Mutex<HashSet<String>>,
    clock: Arc<dyn Clock>,
}

impl NotificationClient {
    /// Create a new notification client
    pub fn new(config: IntegrationConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a client whose limiter and queue read time from `clock`
    pub fn with_clock(config: IntegrationConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if let Some(secret) = &config.signing_secret {
            if secret.expose_secret().is_empty() {
                return Err(Error::Config("signing_secret cannot be empty".to_string()));
            }
        }

        let http = Client::builder().timeout(config.request_timeout()).build()?;

        let rate_limiter = RateLimiter::with_clock(config.rate_limit, clock.clone());
        let policy = RetryPolicy::new(config.retry_attempts, config.retry_delay())
            .with_max_delay(config.retry_max_delay());
        let retry_queue = RetryQueue::with_clock(policy, clock.clone());

        Ok(Self {
            http,
            config,
            rate_limiter,
            retry_queue,
            in_flight: Mutex::new(HashSet::new()),
            clock,
        })
    }

    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn retry_queue(&self) -> &RetryQueue<TestFailureNotification> {
        &self.retry_queue
    }

    /// Send a test failure notification
    ///
    /// Only delivery failures are queued for retry; disabled, in-flight,
    /// and rate-limited outcomes leave no trace.
    pub async fn notify(
        &self,
        notification: &TestFailureNotification,
    ) -> std::result::Result<NotificationReceipt, NotifyError> {
        self.attempt(notification).await.result
    }

    /// Retry every ready item once
    ///
    /// Items that fail on their last attempt are removed and logged as dropped.
    /// Items already being delivered elsewhere are skipped.
    pub async fn process_retry_queue(&self) -> RetrySummary {
        let ready = self.retry_queue.get_ready();
        let mut summary = RetrySummary::default();

        for item in ready {
            summary.attempted += 1;
            debug!("Retrying notification {} (attempt {})", item.id, item.attempts + 1);

            let attempt = self.attempt(&item.payload).await;
            match attempt.result {
                Ok(_) => summary.delivered += 1,
                Err(NotifyError::InFlight(_)) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
            if attempt.dropped {
                summary.dropped += 1;
            }
        }

        summary
    }

    async fn attempt(&self, notification: &TestFailureNotification) -> Attempt {
        let attempt = self.try_notify(notification).await;

        let outcome = match &attempt.result {
            Ok(_) => "delivered",
            Err(e) => e.outcome(),
        };
        METRICS.record_notification(outcome);

        attempt
    }

    async fn try_notify(&self, notification: &TestFailureNotification) -> Attempt {
        if !self.config.enabled {
            return NotifyError::Disabled.into();
        }

        let id = notification.identity();
        let _guard = match InFlightGuard::acquire(&self.in_flight, &id) {
            Some(guard) => guard,
            None => return NotifyError::InFlight(id).into(),
        };

        if let Err(rejection) = self.rate_limiter.can_notify(&notification.workflow) {
            warn!("Notification {} not sent: {}", id, rejection);
            return NotifyError::from(rejection).into();
        }

        let start = Instant::now();
        let delivery = self.send_notification(notification).await;
        METRICS.delivery_duration.observe(start.elapsed().as_secs_f64());

        match delivery {
            Ok(receipt) => {
                self.rate_limiter.record_notification(&notification.workflow);
                self.retry_queue.remove(&id);
                info!(
                    "Notification {} delivered ({} failures, session={:?})",
                    id,
                    notification.failures.len(),
                    receipt.session_id
                );
                Attempt {
                    result: Ok(receipt),
                    dropped: false,
                }
            }
            Err(reason) => {
                let attempts = self
                    .retry_queue
                    .add(id.clone(), notification.clone(), Some(reason.clone()));
                METRICS.retry_enqueued.inc();
                let max_attempts = self.retry_queue.policy().max_attempts;
                warn!(
                    "Notification {} failed (attempt {}/{}): {}",
                    id, attempts, max_attempts, reason
                );

                let dropped = attempts >= max_attempts && self.drop_exhausted(&id, &reason);
                Attempt {
                    result: Err(NotifyError::Delivery(reason)),
                    dropped,
                }
            }
        }
    }

    /// Remove an entry that has used its last attempt
    fn drop_exhausted(&self, id: &str, reason: &str) -> bool {
        if self.retry_queue.remove(id).is_none() {
            return false;
        }
        METRICS.retry_dropped.inc();
        error!("Max retries exceeded for notification {}: {}", id, reason);
        true
    }

    /// Probe the downstream health endpoint
    pub async fn health_check(&self) -> HealthStatus {
        if !self.config.enabled {
            return HealthStatus::unhealthy("Integration disabled");
        }

        let status = match self
            .http
            .get(self.config.health_url())
            .timeout(self.config.health_timeout())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => HealthStatus::healthy(),
            Ok(response) => HealthStatus::unhealthy(format!("HTTP {}", response.status().as_u16())),
            Err(e) if e.is_timeout() => HealthStatus::unhealthy(format!("Timeout: {}", e)),
            Err(e) => HealthStatus::unhealthy(e.to_string()),
        };

        METRICS.record_health_check(status.healthy);
        status
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            rate_limiter: self.rate_limiter.stats(),
            retry_queue: self.retry_queue.stats(),
        }
    }

    /// POST the notification; errors are the failure reason
    async fn send_notification(
        &self,
        notification: &TestFailureNotification,
    ) -> std::result::Result<NotificationReceipt, String> {
        let body = serde_json::to_string(notification)
            .map_err(|e| format!("Failed to serialize notification: {}", e))?;

        let mut req = self
            .http
            .post(self.config.notify_url())
            .header(CONTENT_TYPE, "application/json");

        if let Some(api_key) = &self.config.api_key {
            req = req.bearer_auth(api_key.expose_secret());
        }

        if let Some(secret) = &self.config.signing_secret {
            let timestamp = self.clock.now().timestamp_millis();
            let signature =
                sign_body(secret.expose_secret(), &body, timestamp).map_err(|e| e.to_string())?;
            req = req
                .header(SIGNATURE_HEADER, signature)
                .header(TIMESTAMP_HEADER, timestamp.to_string());
        }

        let response = req.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                format!("Timeout: {}", e)
            } else {
                e.to_string()
            }
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(format!("HTTP {}: {}", status.as_u16(), text));
        }

        // 2xx bodies without a session id still count as delivered
        let session_id = serde_json::from_str::<NotifyResponse>(&text)
            .ok()
            .and_then(NotifyResponse::into_session_id);

        Ok(NotificationReceipt { session_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationType;
    use crate::notify::models::FailureEntry;
    use chrono::Utc;

    fn notification(workflow: &str, report_id: u64) -> TestFailureNotification {
        TestFailureNotification {
            workflow: workflow.to_string(),
            run_number: None,
            report_id,
            failures: vec![FailureEntry {
                test_name: "logs in".to_string(),
                test_file: None,
                line_number: None,
                error_message: "boom".to_string(),
                stack_trace: None,
                classification_type: ClassificationType::New,
            }],
            total_tests: 3,
            failed_tests: 1,
            passed_tests: 2,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_disabled_client() {
        let config = IntegrationConfig {
            enabled: false,
            ..Default::default()
        };
        let client = NotificationClient::new(config).unwrap();

        let result = tokio_test::block_on(client.notify(&notification("e2e", 1)));

        assert!(matches!(result, Err(NotifyError::Disabled)));
        assert!(client.retry_queue().is_empty());
        assert_eq!(client.rate_limiter().stats().total, 0);
    }

    #[test]
    fn test_empty_signing_secret_rejected() {
        let config = IntegrationConfig {
            signing_secret: Some(secrecy::SecretString::new(String::new())),
            ..Default::default()
        };
        assert!(matches!(NotificationClient::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_in_flight_guard_blocks_same_identity() {
        let set = Mutex::new(HashSet::new());
        let guard = InFlightGuard::acquire(&set, "e2e:1");
        assert!(guard.is_some());
        assert!(InFlightGuard::acquire(&set, "e2e:1").is_none());
        assert!(InFlightGuard::acquire(&set, "e2e:2").is_some());

        drop(guard);
        assert!(InFlightGuard::acquire(&set, "e2e:1").is_some());
    }

    #[tokio::test]
    async fn test_unreachable_server_queues_retry() {
        let config = IntegrationConfig {
            server_url: "http://127.0.0.1:1".to_string(),
            request_timeout_ms: 2000,
            ..Default::default()
        };
        let client = NotificationClient::new(config).unwrap();

        let result = client.notify(&notification("e2e", 9)).await;

        assert!(matches!(result, Err(NotifyError::Delivery(_))));
        let item = client.retry_queue().get("e2e:9").unwrap();
        assert_eq!(item.attempts, 1);
        assert!(item.error.is_some());
    }

    #[tokio::test]
    async fn test_retry_drain_skips_in_flight_identity() {
        let clock = Arc::new(crate::clock::ManualClock::default());
        let client = NotificationClient::with_clock(IntegrationConfig::default(), clock.clone())
            .unwrap();
        client
            .retry_queue()
            .add("e2e:3", notification("e2e", 3), Some("HTTP 500: boom".to_string()));
        clock.advance(std::time::Duration::from_secs(2));

        let _held = InFlightGuard::acquire(&client.in_flight, "e2e:3").unwrap();
        let summary = client.process_retry_queue().await;

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.dropped, 0);
        let item = client.retry_queue().get("e2e:3").unwrap();
        assert_eq!(item.attempts, 1);
    }

    #[test]
    fn test_drop_exhausted_counts_once() {
        let client = NotificationClient::new(IntegrationConfig::default()).unwrap();
        client.retry_queue().add("e2e:4", notification("e2e", 4), None);

        assert!(client.drop_exhausted("e2e:4", "boom"));
        assert!(!client.drop_exhausted("e2e:4", "boom"));
        assert!(client.retry_queue().is_empty());
    }

    #[tokio::test]
    async fn test_health_check_disabled() {
        let config = IntegrationConfig {
            enabled: false,
            ..Default::default()
        };
        let client = NotificationClient::new(config).unwrap();

        let health = client.health_check().await;
        assert!(!health.healthy);
        assert_eq!(health.error.as_deref(), Some("Integration disabled"));
    }
}
