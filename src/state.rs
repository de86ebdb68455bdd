use std::time::Duration;

use tokio::sync::broadcast;

use crate::engine::availability::AvailabilityIndex;
use crate::models::driver::Driver;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub struct AppState {
    pub store: Store,
    pub index: AvailabilityIndex,
    pub driver_events_tx: broadcast::Sender<Vec<Driver>>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize, availability_ttl: Duration) -> Self {
        let (driver_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            store: Store::new(),
            index: AvailabilityIndex::new(availability_ttl),
            driver_events_tx,
            metrics: Metrics::new(),
        }
    }
}
