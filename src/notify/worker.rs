//! Periodic retry queue drain

use super::client::{NotificationClient, RetrySummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Background task calling [`NotificationClient::process_retry_queue`] on an interval
pub struct RetryWorker {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RetryWorker {
    /// Start draining `client`'s retry queue every `interval`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(client: Arc<NotificationClient>, interval: Duration) -> Self {
        let (tx, mut rx) = oneshot::channel::<()>();
        let period = interval.max(MIN_INTERVAL);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        log_summary(&client.process_retry_queue().await);
                    }
                }
            }

            debug!("Retry worker stopped");
        });

        debug!("Retry worker started (interval {:?})", period);

        Self {
            shutdown: Some(tx),
            handle,
        }
    }

    /// Stop the worker and wait for the current drain to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            warn!("Retry worker ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn log_summary(summary: &RetrySummary) {
    if summary.attempted == 0 {
        return;
    }
    info!(
        "Retry drain: {} attempted, {} delivered, {} failed, {} dropped, {} skipped",
        summary.attempted, summary.delivered, summary.failed, summary.dropped, summary.skipped
    );
}
