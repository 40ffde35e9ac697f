use prometheus::{IntCounter, IntGauge, Registry};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static GATEWAYS_MANAGED: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new("gateways_managed", "Gateways currently tracked by the store")
        .expect("metric names are static and valid");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("metric is only registered once");
    gauge
});

pub static ROUTES_BOUND_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "routes_bound_total",
        "Routes successfully bound to a listener",
    )
    .expect("metric names are static and valid");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric is only registered once");
    counter
});

pub static SYNC_SUCCESS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new("sync_success_total", "Mesh config syncs that applied cleanly")
        .expect("metric names are static and valid");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric is only registered once");
    counter
});

pub static SYNC_FAILURE_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new("sync_failure_total", "Mesh config syncs that failed to apply")
        .expect("metric names are static and valid");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric is only registered once");
    counter
});

pub static INTENTION_RECONCILE_CYCLES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "intention_reconcile_cycles_total",
        "Completed intention reconciliation cycles, event-driven or periodic",
    )
    .expect("metric names are static and valid");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric is only registered once");
    counter
});

/// Forces every metric to register with [`REGISTRY`] before the health/metrics
/// endpoint serves its first scrape.
pub fn init_metrics() {
    LazyLock::force(&GATEWAYS_MANAGED);
    LazyLock::force(&ROUTES_BOUND_TOTAL);
    LazyLock::force(&SYNC_SUCCESS_TOTAL);
    LazyLock::force(&SYNC_FAILURE_TOTAL);
    LazyLock::force(&INTENTION_RECONCILE_CYCLES_TOTAL);
}
