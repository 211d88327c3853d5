//! Periodic job metrics (refresh, classification, eviction, settings reload)

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::time::Duration;

static JOB_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hot_feed_job_runs_total",
        "Total periodic job cycles (success/error)",
        &["job", "status"]
    )
    .expect("Failed to register job runs metric")
});

static JOB_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "hot_feed_job_duration_seconds",
        "Duration of periodic job cycles",
        &["job"],
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    )
    .expect("Failed to register job duration metric")
});

static REFRESH_ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hot_feed_refresh_items_total",
        "Items handled by the score refresher (refreshed/skipped)",
        &["result"]
    )
    .expect("Failed to register refresh items metric")
});

static REFRESH_SELECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "hot_feed_refresh_selected",
        "Items selected for rescoring in the last refresh cycle"
    )
    .expect("Failed to register refresh selected metric")
});

static CLASSIFICATION_ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hot_feed_classification_items_total",
        "Flagged items by classification outcome",
        &["outcome"]
    )
    .expect("Failed to register classification items metric")
});

static EVICTED_ITEMS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hot_feed_evicted_items_total",
        "Items removed by the stale eviction sweep"
    )
    .expect("Failed to register evicted items metric")
});

static SETTINGS_VERSION: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "hot_feed_settings_version",
        "Version of the filter settings snapshot in effect"
    )
    .expect("Failed to register settings version metric")
});

/// Record a job cycle result (success/error) and its duration
pub fn record_job_run(job: &str, status: &str, duration: Duration) {
    JOB_RUNS_TOTAL.with_label_values(&[job, status]).inc();
    JOB_DURATION_SECONDS
        .with_label_values(&[job])
        .observe(duration.as_secs_f64());
}

pub fn record_refresh(selected: usize, refreshed: u64, skipped: u64) {
    REFRESH_SELECTED.set(selected as i64);
    REFRESH_ITEMS_TOTAL
        .with_label_values(&["refreshed"])
        .inc_by(refreshed);
    REFRESH_ITEMS_TOTAL
        .with_label_values(&["skipped"])
        .inc_by(skipped);
}

/// outcome: on_topic / off_topic / fetch_failed / classifier_failed
pub fn record_classification(outcome: &str, count: u64) {
    CLASSIFICATION_ITEMS_TOTAL
        .with_label_values(&[outcome])
        .inc_by(count);
}

pub fn record_evicted(count: u64) {
    EVICTED_ITEMS_TOTAL.inc_by(count);
}

pub fn set_settings_version(version: u64) {
    SETTINGS_VERSION.set(version as i64);
}
