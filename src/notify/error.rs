//! Notification outcome errors

use super::rate_limiter::RateLimitRejection;
use thiserror::Error;

/// Reasons a notification was not delivered
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// Integration switched off by configuration; terminal
    #[error("Notification integration is disabled")]
    Disabled,

    /// Another attempt for the same identity is still running
    #[error("Delivery already in flight for {0}")]
    InFlight(String),

    /// Rejected by the rate limiter; not queued for retry
    #[error("{0}")]
    RateLimited(#[from] RateLimitRejection),

    /// Network error or non-2xx response; queued for retry
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl NotifyError {
    /// True for failures that were placed on the retry queue
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotifyError::Delivery(_))
    }

    /// Metrics label for the outcome
    pub fn outcome(&self) -> &'static str {
        match self {
            NotifyError::Disabled => "disabled",
            NotifyError::InFlight(_) => "in_flight",
            NotifyError::RateLimited(_) => "rate_limited",
            NotifyError::Delivery(_) => "failed",
        }
    }
}
