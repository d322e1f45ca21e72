//! Failure history bookkeeping and the history store seam

use super::models::{FailureData, FailureHistorySnapshot};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Fold one run outcome into a history snapshot
///
/// The returned snapshot is for the caller to persist.
pub fn update_failure_history(
    existing: Option<&FailureHistorySnapshot>,
    is_failure: bool,
    now: DateTime<Utc>,
) -> FailureHistorySnapshot {
    let hit = u32::from(is_failure);

    match existing {
        None => FailureHistorySnapshot {
            occurrences: hit,
            consecutive_failures: hit,
            total_runs: 1,
            last_seen: now,
        },
        Some(prev) => FailureHistorySnapshot {
            occurrences: prev.occurrences.saturating_add(hit),
            consecutive_failures: if is_failure {
                prev.consecutive_failures.saturating_add(1)
            } else {
                0
            },
            total_runs: prev.total_runs.saturating_add(1),
            last_seen: now,
        },
    }
}

/// Failure rate as a percentage, 0 when there are no runs
pub fn calculate_failure_rate(occurrences: u32, total_runs: u32) -> f64 {
    if total_runs == 0 {
        return 0.0;
    }
    f64::from(occurrences) / f64::from(total_runs) * 100.0
}

/// A test has recovered when it passes after failing
pub fn has_recovered(consecutive_failures: u32, is_failure: bool) -> bool {
    consecutive_failures > 0 && !is_failure
}

/// Stable identity for a test: `file::name` when the file is known
pub fn test_identifier(test_name: &str, test_file: Option<&str>) -> String {
    match test_file {
        Some(file) => format!("{}::{}", file, test_name),
        None => test_name.to_string(),
    }
}

impl FailureData {
    pub fn identifier(&self) -> String {
        test_identifier(&self.test_name, self.test_file.as_deref())
    }
}

/// Persistence seam for failure history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the history for a test identity, if any
    async fn load(&self, test_id: &str) -> Result<Option<FailureHistorySnapshot>>;

    /// Replace the history for a test identity
    async fn save(&self, test_id: &str, snapshot: FailureHistorySnapshot) -> Result<()>;
}

/// Process-local history store
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<HashMap<String, FailureHistorySnapshot>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn load(&self, test_id: &str) -> Result<Option<FailureHistorySnapshot>> {
        Ok(self.entries.read().await.get(test_id).cloned())
    }

    async fn save(&self, test_id: &str, snapshot: FailureHistorySnapshot) -> Result<()> {
        self.entries.write().await.insert(test_id.to_string(), snapshot);
        Ok(())
    }
}
