//! Prometheus metrics for trust-service.

use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, HistogramVec, TextEncoder, register_counter_vec, register_histogram_vec,
};

/// Trust evaluations by decision.
pub static EVALUATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trust_evaluations_total",
        "Total number of trust evaluations",
        &["decision"]
    )
    .expect("Failed to register evaluations_total")
});

/// Directory sync outcomes by action.
pub static SYNC_RESULTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trust_sync_results_total",
        "Directory sync record outcomes",
        &["action"] // created, updated, skipped, failed
    )
    .expect("Failed to register sync_results_total")
});

/// Directory connector errors for alerting.
pub static DIRECTORY_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trust_directory_errors_total",
        "Directory connector errors by kind",
        &["kind"] // timeout, unavailable
    )
    .expect("Failed to register directory_errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "trust_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&EVALUATIONS_TOTAL);
    Lazy::force(&SYNC_RESULTS_TOTAL);
    Lazy::force(&DIRECTORY_ERRORS_TOTAL);
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
