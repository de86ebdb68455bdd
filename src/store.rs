use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::order::Order;
use crate::models::user::User;

/// Concurrent record store for users, drivers, and orders.
///
/// Single-record reads are lock-free. Every state-mutating service
/// operation holds the transaction latch (`begin`) for its whole
/// read-check-write span, so cross-entity writes (order + driver) commit
/// as one unit and concurrent callers are serialized.
pub struct Store {
    users: DashMap<Uuid, User>,
    drivers: DashMap<Uuid, Driver>,
    orders: DashMap<u64, Order>,
    next_order_id: AtomicU64,
    txn: Mutex<()>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            drivers: DashMap::new(),
            orders: DashMap::new(),
            next_order_id: AtomicU64::new(1),
            txn: Mutex::new(()),
        }
    }

    pub async fn begin(&self) -> MutexGuard<'_, ()> {
        self.txn.lock().await
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    pub fn driver(&self, user_id: Uuid) -> Option<Driver> {
        self.drivers.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn put_driver(&self, driver: Driver) {
        self.drivers.insert(driver.user_id, driver);
    }

    pub fn order(&self, id: u64) -> Option<Order> {
        self.orders.get(&id).map(|entry| entry.value().clone())
    }

    pub fn put_order(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn allocate_order_id(&self) -> u64 {
        self.next_order_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Drivers eligible for assignment: online, not busy, with a known
    /// location. Most recent registration first, which is the natural
    /// order of the availability index.
    pub fn scan_available(&self) -> Vec<Driver> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .filter(|entry| entry.value().available() && entry.value().location.is_some())
            .map(|entry| entry.value().clone())
            .collect();

        drivers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        drivers
    }

    pub fn orders_for_client(&self, client_id: Uuid) -> Vec<Order> {
        self.collect_orders(|order| order.client_id == client_id)
    }

    pub fn orders_for_driver(&self, driver_id: Uuid) -> Vec<Order> {
        self.collect_orders(|order| order.driver_id == Some(driver_id))
    }

    fn collect_orders(&self, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}
