//! Stale Evictor Background Job
//!
//! Deletes items that are older than `stale_age` and still score below
//! `score_floor`. Classification state plays no part.

use crate::config::EvictionConfig;
use crate::db::ItemStore;
use crate::error::Result;
use crate::metrics::jobs as metrics;
use crate::services::tiers::saturating_ms;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, MissedTickBehavior};

pub async fn start_stale_evictor(store: Arc<dyn ItemStore>, config: EvictionConfig) {
    tracing::info!(
        "Starting stale evictor background job (interval={}m, stale_age={}h, score_floor={})",
        config.interval.as_secs() / 60,
        config.stale_age.as_secs() / 3600,
        config.score_floor
    );

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let cycle_start = Instant::now();
        let now_ms = chrono::Utc::now().timestamp_millis();
        match run_eviction_cycle(store.as_ref(), &config, now_ms).await {
            Ok(evicted) => {
                metrics::record_job_run("stale_evictor", "success", cycle_start.elapsed());
                tracing::info!(
                    evicted,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Stale eviction cycle completed"
                );
            }
            Err(e) => {
                metrics::record_job_run("stale_evictor", "error", cycle_start.elapsed());
                tracing::error!(
                    error = %e,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Stale eviction cycle failed"
                );
            }
        }
    }
}

/// Removes items with `now - first_indexed > stale_age` and `score < score_floor`.
pub async fn run_eviction_cycle(
    store: &dyn ItemStore,
    config: &EvictionConfig,
    now_ms: i64,
) -> Result<u64> {
    let cutoff_ms = now_ms.saturating_sub(saturating_ms(config.stale_age));
    let evicted = store.delete_stale(cutoff_ms, config.score_floor).await?;
    metrics::record_evicted(evicted);
    Ok(evicted)
}
