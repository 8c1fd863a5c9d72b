//! The read API: one consistent view of the cache plus its aggregates.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::aggregate::{Outage, ServiceGroup, classify, group};
use crate::cache::{CacheEntry, ResultCache};
use crate::types::ServiceResult;

/// Everything a status page needs, derived from a single cache read.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub results: Arc<[ServiceResult]>,
    pub captured_at: Option<SystemTime>,
    /// Time since `captured_at`, rounded to whole seconds. Zero on cold start.
    pub age: Duration,
    pub outage: Outage,
    pub groups: Vec<ServiceGroup>,
    pub generation: u64,
}

impl StatusSnapshot {
    /// Derive a snapshot from a cache entry as seen at `now`.
    pub fn from_entry(entry: CacheEntry, now: SystemTime) -> Self {
        let age = entry
            .captured_at
            .and_then(|at| now.duration_since(at).ok())
            .map(round_to_secs)
            .unwrap_or_default();

        Self {
            outage: classify(&entry.results),
            groups: group(&entry.results),
            results: entry.results,
            captured_at: entry.captured_at,
            age,
            generation: entry.generation,
        }
    }

    /// `false` until the first poll cycle has been published.
    pub fn is_ready(&self) -> bool {
        self.captured_at.is_some()
    }

    pub fn passing(&self) -> usize {
        self.results.iter().filter(|r| r.status).count()
    }

    /// Find a result by service name.
    pub fn service(&self, name: &str) -> Option<&ServiceResult> {
        self.results.iter().find(|r| r.name() == name)
    }
}

fn round_to_secs(d: Duration) -> Duration {
    Duration::from_secs((d.as_millis() as u64 + 500) / 1000)
}

impl ResultCache {
    /// Read the cache once and derive outage state and grouping from it.
    pub async fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::from_entry(self.entry().await, SystemTime::now())
    }
}
