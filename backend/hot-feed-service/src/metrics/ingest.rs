//! Firehose ingestion metrics

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

static FILTER_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hot_feed_filter_decisions_total",
        "Filter pipeline decisions by outcome (accepted or reject reason)",
        &["outcome"]
    )
    .expect("Failed to register filter decisions metric")
});

static OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hot_feed_ingest_operations_total",
        "Stream operations seen by the ingest handler",
        &["kind"]
    )
    .expect("Failed to register ingest operations metric")
});

static RECONNECTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hot_feed_firehose_reconnects_total",
        "Firehose connection attempts after a failure"
    )
    .expect("Failed to register firehose reconnects metric")
});

static CURSOR: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "hot_feed_firehose_cursor",
        "Last persisted firehose cursor (microseconds)"
    )
    .expect("Failed to register firehose cursor metric")
});

pub fn record_filter_decision(outcome: &str) {
    FILTER_DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// kind: create / delete / malformed
pub fn record_operations(kind: &str, count: u64) {
    OPERATIONS_TOTAL.with_label_values(&[kind]).inc_by(count);
}

pub fn record_reconnect() {
    RECONNECTS_TOTAL.inc();
}

pub fn set_cursor(cursor: i64) {
    CURSOR.set(cursor);
}
