//! Metrics collection for observability

use crate::classifier::ClassificationType;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Histogram, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Classification metrics
    pub evaluations: CounterVec,

    // Delivery metrics
    pub notifications: CounterVec,
    pub delivery_duration: Histogram,
    pub health_checks: CounterVec,

    // Rate limiting metrics
    pub rate_limit_rejections: CounterVec,

    // Retry queue metrics
    pub retry_enqueued: Counter,
    pub retry_dropped: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let evaluations = register_counter_vec_with_registry!(
            Opts::new("failure_evaluations_total", "Failures evaluated by classification"),
            &["classification"],
            registry
        )?;

        let notifications = register_counter_vec_with_registry!(
            Opts::new("escalation_notifications_total", "Notification attempts by outcome"),
            &["outcome"],
            registry
        )?;

        let delivery_duration = register_histogram_with_registry!(
            "escalation_delivery_duration_seconds",
            "Downstream delivery request duration in seconds",
            registry
        )?;

        let health_checks = register_counter_vec_with_registry!(
            Opts::new("escalation_health_checks_total", "Downstream health checks by status"),
            &["status"],
            registry
        )?;

        let rate_limit_rejections = register_counter_vec_with_registry!(
            Opts::new(
                "escalation_rate_limit_rejections_total",
                "Notifications rejected by the rate limiter"
            ),
            &["scope"],
            registry
        )?;

        let retry_enqueued = register_counter_with_registry!(
            Opts::new(
                "escalation_retry_enqueued_total",
                "Failed deliveries placed on the retry queue"
            ),
            registry
        )?;

        let retry_dropped = register_counter_with_registry!(
            Opts::new(
                "escalation_retry_dropped_total",
                "Notifications dropped after exhausting retries"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            evaluations,
            notifications,
            delivery_duration,
            health_checks,
            rate_limit_rejections,
            retry_enqueued,
            retry_dropped,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a classified failure
    pub fn record_evaluation(&self, classification: ClassificationType) {
        self.evaluations
            .with_label_values(&[classification.as_str()])
            .inc();
    }

    /// Record a notification outcome
    ///
    /// One of `delivered`, `failed`, `disabled`, `rate_limited`, or `in_flight`.
    pub fn record_notification(&self, outcome: &str) {
        self.notifications.with_label_values(&[outcome]).inc();
    }

    /// Record a rate limiter rejection (`global` or `workflow`)
    pub fn record_rate_limit(&self, scope: &str) {
        self.rate_limit_rejections.with_label_values(&[scope]).inc();
    }

    pub fn record_health_check(&self, healthy: bool) {
        let status = if healthy { "healthy" } else { "unhealthy" };
        self.health_checks.with_label_values(&[status]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
