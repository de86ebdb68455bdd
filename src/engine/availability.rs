use std::time::Duration;

use crate::cache::ExpiringCache;
use crate::models::driver::Driver;
use crate::observability::metrics::Metrics;
use crate::state::AppState;
use crate::store::Store;

const AVAILABLE_DRIVERS_KEY: &str = "available_drivers";

/// Read-optimized view answering "which drivers are assignable right now".
///
/// The index trades strict freshness for throughput under a short TTL and
/// is invalidated synchronously by every store write that can change
/// eligibility. Callers must treat the result as a candidate hint only;
/// the assignment engine re-checks live state before committing.
pub struct AvailabilityIndex {
    cache: ExpiringCache,
    ttl: Duration,
}

impl AvailabilityIndex {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: ExpiringCache::new(),
            ttl,
        }
    }

    /// Returns the current available-driver set.
    ///
    /// A live cached id list is resolved against the store, dropping ids
    /// that no longer resolve. On a miss the store is scanned and the id
    /// list cached. Empty scans are never cached, so a driver coming
    /// online becomes visible on the next read.
    pub fn get_available(&self, store: &Store, metrics: &Metrics) -> Vec<Driver> {
        if let Some(ids) = self.cache.get(AVAILABLE_DRIVERS_KEY) {
            metrics
                .availability_cache_total
                .with_label_values(&["hit"])
                .inc();
            return ids.iter().filter_map(|id| store.driver(*id)).collect();
        }

        metrics
            .availability_cache_total
            .with_label_values(&["miss"])
            .inc();

        let drivers = store.scan_available();
        if !drivers.is_empty() {
            let ids = drivers.iter().map(|driver| driver.user_id).collect();
            self.cache.set(AVAILABLE_DRIVERS_KEY, ids, self.ttl);
        }

        drivers
    }

    pub fn invalidate(&self) {
        self.cache.delete(AVAILABLE_DRIVERS_KEY);
    }
}

/// Recomputes the available set and pushes it to every listener.
///
/// Delivery is best effort: a send error only means nobody is subscribed,
/// and no core behavior depends on it.
pub fn publish_available(state: &AppState) -> Vec<Driver> {
    let drivers = state.index.get_available(&state.store, &state.metrics);
    state.metrics.available_drivers.set(drivers.len() as i64);
    let _ = state.driver_events_tx.send(drivers.clone());
    drivers
}
