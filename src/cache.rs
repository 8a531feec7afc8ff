use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::weather::types::ScoredCity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// Result of one successful refresh. Data and timestamp travel together,
/// so an entry is either complete or absent.
#[derive(Debug, Clone)]
pub struct CachedRanking {
    pub data: Arc<[ScoredCity]>,
    pub fetched_at: DateTime<Utc>,
}

/// Process-wide holder of the latest ranking. Stale entries are kept until
/// the next successful refresh replaces them.
pub struct CacheStore {
    entry: RwLock<Option<Arc<CachedRanking>>>,
    ttl: chrono::Duration,
}

impl CacheStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entry: RwLock::new(None),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn read(&self) -> Option<Arc<CachedRanking>> {
        self.entry.read().clone()
    }

    /// Replace the whole entry in one swap.
    pub fn write(&self, data: Vec<ScoredCity>, now: DateTime<Utc>) -> Arc<CachedRanking> {
        let ranking = Arc::new(CachedRanking {
            data: data.into(),
            fetched_at: now,
        });
        *self.entry.write() = Some(Arc::clone(&ranking));
        ranking
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.entry
            .read()
            .as_deref()
            .is_some_and(|entry| self.entry_is_fresh(entry, now))
    }

    /// The current entry, only if it is still fresh. The same predicate as
    /// `is_fresh`, applied to the snapshot that is handed out.
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<CachedRanking>> {
        self.read().filter(|entry| self.entry_is_fresh(entry, now))
    }

    pub fn status(&self, now: DateTime<Utc>) -> CacheStatus {
        if self.is_fresh(now) {
            CacheStatus::Hit
        } else {
            CacheStatus::Miss
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.read().map(|entry| now - entry.fetched_at)
    }

    // A clock that stepped back behind `fetched_at` makes the entry stale,
    // not fresh for longer than the TTL.
    fn entry_is_fresh(&self, entry: &CachedRanking, now: DateTime<Utc>) -> bool {
        let age = now - entry.fetched_at;
        age >= chrono::Duration::zero() && age < self.ttl
    }
}
