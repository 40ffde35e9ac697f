use getset::{CopyGetters, Getters};
use std::time::Duration;

#[derive(Debug, Clone, Getters, CopyGetters, PartialEq, Eq)]
pub struct Options {
    #[getset(get_copy = "pub")]
    controller_requeue_duration: Duration,

    #[getset(get_copy = "pub")]
    controller_error_requeue_duration: Duration,

    /// Attempts the resolver makes to find a ready backend before giving up.
    #[getset(get_copy = "pub")]
    backend_resolve_retry_count: u32,

    #[getset(get_copy = "pub")]
    backend_resolve_retry_interval: Duration,

    /// Attempts the intention reconciler makes on a compare-and-swap conflict.
    #[getset(get_copy = "pub")]
    intention_cas_retry_count: u32,

    #[getset(get_copy = "pub")]
    intention_cas_retry_interval: Duration,

    /// Interval between full intention reconciliation sweeps, independent of
    /// the event-driven path.
    #[getset(get_copy = "pub")]
    intention_sweep_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            controller_requeue_duration: Duration::from_secs(60),
            controller_error_requeue_duration: Duration::from_secs(5),
            backend_resolve_retry_count: 30,
            backend_resolve_retry_interval: Duration::from_secs(1),
            intention_cas_retry_count: 3,
            intention_cas_retry_interval: Duration::from_secs(1),
            intention_sweep_interval: Duration::from_secs(60),
        }
    }
}
