//! Prometheus metrics for receipt-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Sweep counter by trigger and outcome (completed / failed).
pub static SWEEPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receipt_sweeps_total",
        "Total number of scheduling sweeps",
        &["trigger", "outcome"]
    )
    .expect("Failed to register sweeps_total")
});

/// Receipt generation counter by mode and outcome (generated / skipped / failed).
pub static RECEIPTS_GENERATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receipt_generation_total",
        "Receipt generation saga outcomes",
        &["mode", "outcome"]
    )
    .expect("Failed to register receipts_generated_total")
});

/// Saga compensation counter by failing step.
pub static COMPENSATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receipt_compensations_total",
        "Saga compensations by the step that failed",
        &["failed_step"]
    )
    .expect("Failed to register compensations_total")
});

/// Notification counter by kind (receipt / review) and outcome.
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receipt_notifications_total",
        "Notifications sent by kind",
        &["kind", "outcome"]
    )
    .expect("Failed to register notifications_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "receipt_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&SWEEPS_TOTAL);
    Lazy::force(&RECEIPTS_GENERATED_TOTAL);
    Lazy::force(&COMPENSATIONS_TOTAL);
    Lazy::force(&NOTIFICATIONS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
