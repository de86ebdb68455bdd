use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

/// In-process expiring cache for driver-id sets. Entries are evicted
/// lazily on read; a missing or expired entry just means the caller
/// recomputes from the store. The cache is never a source of truth.
pub struct ExpiringCache {
    entries: DashMap<&'static str, CacheEntry>,
}

struct CacheEntry {
    ids: Vec<Uuid>,
    expires_at: Instant,
}

impl ExpiringCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &'static str) -> Option<Vec<Uuid>> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }

        Some(entry.ids.clone())
    }

    pub fn set(&self, key: &'static str, ids: Vec<Uuid>, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                ids,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn delete(&self, key: &'static str) {
        self.entries.remove(key);
    }
}
