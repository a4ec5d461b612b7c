//! Per-document ingestion locks.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Mutual exclusion keyed by document name.
///
/// Entries nobody holds or waits on are dropped on the next acquisition, so
/// the map stays proportional to the documents currently being ingested.
#[derive(Default)]
pub struct IngestLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IngestLocks {
    /// Create an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document`.
    pub async fn acquire(&self, document: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(document.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of documents with a live lock entry.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Whether no document has a live lock entry.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
