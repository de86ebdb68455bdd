use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub orders_completed_total: IntCounter,
    pub assignments_total: IntCounterVec,
    pub available_drivers: IntGauge,
    pub availability_cache_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total orders created")
                .expect("valid orders_created_total metric");

        let orders_completed_total =
            IntCounter::new("orders_completed_total", "Total orders completed")
                .expect("valid orders_completed_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let available_drivers = IntGauge::new(
            "available_drivers",
            "Current number of available drivers",
        )
        .expect("valid available_drivers metric");

        let availability_cache_total = IntCounterVec::new(
            Opts::new(
                "availability_cache_total",
                "Availability index cache lookups by result",
            ),
            &["result"],
        )
        .expect("valid availability_cache_total metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(orders_completed_total.clone()))
            .expect("register orders_completed_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(available_drivers.clone()))
            .expect("register available_drivers");
        registry
            .register(Box::new(availability_cache_total.clone()))
            .expect("register availability_cache_total");

        Self {
            registry,
            orders_created_total,
            orders_completed_total,
            assignments_total,
            available_drivers,
            availability_cache_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
