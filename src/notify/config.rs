//! Configuration for the downstream notification integration

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Notification caps over a rolling hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Max notifications per workflow per hour
    #[serde(default = "default_per_workflow")]
    pub per_workflow: usize,

    /// Max notifications in total per hour
    #[serde(default = "default_global")]
    pub global: usize,
}

fn default_per_workflow() -> usize { 1 }
fn default_global() -> usize { 5 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_workflow: default_per_workflow(),
            global: default_global(),
        }
    }
}

/// Notification client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Enable/disable notifications globally
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Downstream orchestration service URL
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Path of the notify endpoint, appended to `server_url`
    #[serde(default = "default_notify_path")]
    pub notify_path: String,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Delivery attempts before a notification is dropped
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base retry backoff in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Upper bound on a single retry backoff in milliseconds
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// How often the retry worker drains the queue, in seconds
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    /// Delivery request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Health check timeout in milliseconds
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    /// Bearer token for the downstream service
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// HMAC secret for signing request bodies
    #[serde(default, skip_serializing)]
    pub signing_secret: Option<SecretString>,
}

fn default_enabled() -> bool { true }
fn default_server_url() -> String { "http://localhost:3001".to_string() }
fn default_notify_path() -> String { "/api/trpc/testFailures.notify".to_string() }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 1000 }
fn default_retry_max_delay_ms() -> u64 { 3_600_000 }
fn default_retry_interval_secs() -> u64 { 60 }
fn default_request_timeout_ms() -> u64 { 30_000 }
fn default_health_timeout_ms() -> u64 { 5000 }

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            server_url: default_server_url(),
            notify_path: default_notify_path(),
            rate_limit: RateLimitConfig::default(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retry_interval_secs: default_retry_interval_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            health_timeout_ms: default_health_timeout_ms(),
            api_key: None,
            signing_secret: None,
        }
    }
}

impl IntegrationConfig {
    /// Override fields from `ESCALATION_*` environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("ESCALATION_ENABLED") {
            self.enabled = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("ESCALATION_SERVER_URL") {
            self.server_url = val;
        }

        if let Ok(val) = std::env::var("ESCALATION_NOTIFY_PATH") {
            self.notify_path = val;
        }

        if let Ok(val) = std::env::var("ESCALATION_RATE_LIMIT_PER_WORKFLOW") {
            if let Ok(limit) = val.parse() {
                self.rate_limit.per_workflow = limit;
            }
        }

        if let Ok(val) = std::env::var("ESCALATION_RATE_LIMIT_GLOBAL") {
            if let Ok(limit) = val.parse() {
                self.rate_limit.global = limit;
            }
        }

        if let Ok(val) = std::env::var("ESCALATION_RETRY_ATTEMPTS") {
            if let Ok(attempts) = val.parse() {
                self.retry_attempts = attempts;
            }
        }

        if let Ok(val) = std::env::var("ESCALATION_RETRY_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.retry_delay_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("ESCALATION_RETRY_MAX_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.retry_max_delay_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("ESCALATION_RETRY_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                self.retry_interval_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("ESCALATION_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.request_timeout_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("ESCALATION_API_KEY") {
            self.api_key = Some(SecretString::new(val));
        }

        if let Ok(val) = std::env::var("ESCALATION_SIGNING_SECRET") {
            self.signing_secret = Some(SecretString::new(val));
        }

        self
    }

    /// Full URL of the notify endpoint
    pub fn notify_url(&self) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), self.notify_path)
    }

    /// Full URL of the health endpoint
    pub fn health_url(&self) -> String {
        format!("{}/health", self.server_url.trim_end_matches('/'))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}
