//! The latest complete result set, shared between the poller and readers.
//!
//! A poll cycle replaces the whole entry under a short write lock, so readers
//! only ever see a set that was published in full. Readers clone an `Arc`
//! to the results and never hold the lock while using them.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::debug;

use crate::types::ServiceResult;

/// One published result set.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Results in configuration order.
    pub results: Arc<[ServiceResult]>,
    /// When the poll cycle that produced `results` started. `None` until the
    /// first set.
    pub captured_at: Option<SystemTime>,
    /// Number of sets so far.
    pub generation: u64,
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self {
            results: Arc::from(Vec::new()),
            captured_at: None,
            generation: 0,
        }
    }
}

/// Handle to the shared result cache. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    entry: Arc<RwLock<CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a complete result set captured at `at`.
    pub async fn set(&self, results: Vec<ServiceResult>, at: SystemTime) {
        let results: Arc<[ServiceResult]> = Arc::from(results);
        let mut entry = self.entry.write().await;
        entry.results = results;
        entry.captured_at = Some(at);
        entry.generation += 1;
        debug!(
            services = entry.results.len(),
            generation = entry.generation,
            "result cache updated"
        );
    }

    /// The current result set and its capture time.
    ///
    /// Before the first [`set`](Self::set) this is an empty set and `None`.
    pub async fn get(&self) -> (Arc<[ServiceResult]>, Option<SystemTime>) {
        let entry = self.entry.read().await;
        (Arc::clone(&entry.results), entry.captured_at)
    }

    /// A copy of the whole current entry.
    pub async fn entry(&self) -> CacheEntry {
        self.entry.read().await.clone()
    }
}
