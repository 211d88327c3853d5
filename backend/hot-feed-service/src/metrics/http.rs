//! XRPC request metrics, recorded by the `wrap_fn` middleware in `main`.

use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};
use std::time::Duration;

static XRPC_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hot_feed_xrpc_requests_total",
        "Requests served, by route pattern and status",
        &["method", "route", "status"]
    )
    .expect("Failed to register xrpc requests metric")
});

// Upper bucket matches the pool acquire timeout.
static XRPC_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "hot_feed_xrpc_latency_seconds",
        "Request latency by route pattern",
        &["route"],
        vec![0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0, 10.0]
    )
    .expect("Failed to register xrpc latency metric")
});

/// `route` is the matched pattern, never the raw path, so labels stay bounded.
pub fn observe_request(method: &str, route: &str, status: u16, elapsed: Duration) {
    XRPC_REQUESTS_TOTAL
        .with_label_values(&[method, route, status.to_string().as_str()])
        .inc();
    XRPC_LATENCY_SECONDS
        .with_label_values(&[route])
        .observe(elapsed.as_secs_f64());
}
