use lazy_static::lazy_static;
use prometheus::Counter;
use prometheus::Registry;
use slog::Logger;

lazy_static! {
    pub static ref PROBE_RUNS_TOTAL: Counter = Counter::new(
        "anycast_probe_runs_total",
        "Total number of health probe executions"
    ).expect("Failed to create PROBE_RUNS_TOTAL counter");

    pub static ref PROBE_FAIL_TOTAL: Counter = Counter::new(
        "anycast_probe_fail_total",
        "Total number of health probe executions that failed or timed out"
    ).expect("Failed to create PROBE_FAIL_TOTAL counter");

    pub static ref REFRESH_TOTAL: Counter = Counter::new(
        "anycast_refresh_total",
        "Total number of membership refresh/reconciliation cycles"
    ).expect("Failed to create REFRESH_TOTAL counter");

    pub static ref RECREATE_TOTAL: Counter = Counter::new(
        "anycast_recreate_total",
        "Total number of ephemeral membership node (re)creation attempts"
    ).expect("Failed to create RECREATE_TOTAL counter");

    pub static ref RECREATE_SOFT_FAIL_TOTAL: Counter = Counter::new(
        "anycast_recreate_soft_fail_total",
        "Total number of membership node creations deferred due to session expiry"
    ).expect("Failed to create RECREATE_SOFT_FAIL_TOTAL counter");

    pub static ref SUSPENDED_TOTAL: Counter = Counter::new(
        "anycast_session_suspended_total",
        "Total number of times the zookeeper session transitioned to Suspended"
    ).expect("Failed to create SUSPENDED_TOTAL counter");

    pub static ref LOST_TOTAL: Counter = Counter::new(
        "anycast_session_lost_total",
        "Total number of times the zookeeper session transitioned to Lost"
    ).expect("Failed to create LOST_TOTAL counter");

    pub static ref ITERATIONS_TOTAL: Counter = Counter::new(
        "anycast_loop_iterations_total",
        "Total number of control loop iterations that ran past the health probe"
    ).expect("Failed to create ITERATIONS_TOTAL counter");
}

/// Attempts to register this crate's own metrics with the registry.
///
/// Metrics that fail to register (e.g. duplicate registration in a test harness) are logged and
/// ignored, matching the teacher's `register_metrics` convention.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    if let Err(err) = registry.register(Box::new(PROBE_RUNS_TOTAL.clone())) {
        debug!(logger, "Failed to register PROBE_RUNS_TOTAL"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(PROBE_FAIL_TOTAL.clone())) {
        debug!(logger, "Failed to register PROBE_FAIL_TOTAL"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(REFRESH_TOTAL.clone())) {
        debug!(logger, "Failed to register REFRESH_TOTAL"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(RECREATE_TOTAL.clone())) {
        debug!(logger, "Failed to register RECREATE_TOTAL"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(RECREATE_SOFT_FAIL_TOTAL.clone())) {
        debug!(logger, "Failed to register RECREATE_SOFT_FAIL_TOTAL"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(SUSPENDED_TOTAL.clone())) {
        debug!(logger, "Failed to register SUSPENDED_TOTAL"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(LOST_TOTAL.clone())) {
        debug!(logger, "Failed to register LOST_TOTAL"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(ITERATIONS_TOTAL.clone())) {
        debug!(logger, "Failed to register ITERATIONS_TOTAL"; "error" => ?err);
    }
    super::zk::register_metrics(logger, registry);
}
