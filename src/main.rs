use anyhow::{Context, Result};
use failure_escalation::logging::init_tracing;
use failure_escalation::metrics::METRICS;
use failure_escalation::{Config, NotificationClient, RetryWorker};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    info!(
        "Starting failure escalation (server={}, enabled={})",
        config.integration.server_url, config.integration.enabled
    );

    let retry_interval = config.integration.retry_interval();
    let client = Arc::new(
        NotificationClient::new(config.integration).context("Failed to build notification client")?,
    );

    let health = client.health_check().await;
    if health.healthy {
        info!("Downstream service is healthy");
    } else {
        warn!(
            "Downstream service unhealthy: {}",
            health.error.as_deref().unwrap_or("unknown")
        );
    }

    let worker = RetryWorker::spawn(client.clone(), retry_interval);
    info!("Retry worker running every {:?}", retry_interval);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down");
    worker.shutdown().await;

    let stats = client.stats();
    info!(
        "Pending retries at shutdown: {} ({} maxed out)",
        stats.retry_queue.total, stats.retry_queue.maxed_out
    );
    debug!("Final metrics:\n{}", METRICS.export_prometheus());

    Ok(())
}
