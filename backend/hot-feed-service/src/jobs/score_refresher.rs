//! Score Refresher Background Job
//!
//! Rescores items that are due under the age-tiered cadence. Runs once at
//! startup, then every `refresh_interval`, and additionally whenever the
//! query path submits a refresh request.
//!
//! A failed or timed-out engagement fetch skips the item for this cycle. It
//! is never deleted and never rescored down to zero.

use crate::clients::ContentSource;
use crate::config::RankingConfig;
use crate::db::ItemStore;
use crate::error::Result;
use crate::metrics::jobs as metrics;
use crate::models::RankedItem;
use crate::services::scoring::score_item;
use crate::services::RefreshRequests;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub selected: usize,
    pub refreshed: u64,
    pub skipped: u64,
}

pub async fn start_score_refresher(
    store: Arc<dyn ItemStore>,
    content: Arc<dyn ContentSource>,
    config: RankingConfig,
    mut requests: RefreshRequests,
) {
    tracing::info!(
        interval_secs = config.refresh_interval.as_secs(),
        tiers = config.tiers.len(),
        max_concurrency = config.max_concurrency,
        "Starting score refresher background job"
    );

    let mut ticker = interval(config.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut requests_open = true;

    loop {
        let trigger = tokio::select! {
            _ = ticker.tick() => "schedule",
            request = requests.next(), if requests_open => {
                if request.is_none() {
                    requests_open = false;
                    continue;
                }
                "query"
            }
        };

        let cycle_start = Instant::now();
        let now_ms = chrono::Utc::now().timestamp_millis();
        match run_refresh_cycle(store.as_ref(), content.as_ref(), &config, now_ms).await {
            Ok(summary) => {
                metrics::record_job_run("score_refresher", "success", cycle_start.elapsed());
                tracing::info!(
                    trigger,
                    selected = summary.selected,
                    refreshed = summary.refreshed,
                    skipped = summary.skipped,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Score refresh cycle completed"
                );
            }
            Err(e) => {
                metrics::record_job_run("score_refresher", "error", cycle_start.elapsed());
                tracing::error!(
                    trigger,
                    error = %e,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Score refresh cycle failed"
                );
            }
        }
    }
}

/// One refresh pass at `now_ms`. Fetches run concurrently up to
/// `max_concurrency`, each bounded by `fetch_timeout`.
pub async fn run_refresh_cycle(
    store: &dyn ItemStore,
    content: &dyn ContentSource,
    config: &RankingConfig,
    now_ms: i64,
) -> Result<RefreshSummary> {
    let due = store.select_due_for_refresh(now_ms, &config.tiers).await?;
    let mut summary = RefreshSummary {
        selected: due.len(),
        ..RefreshSummary::default()
    };
    if due.is_empty() {
        return Ok(summary);
    }

    let fetch_timeout = config.fetch_timeout;
    let fetched: Vec<_> = stream::iter(due)
        .map(|item| async move {
            let engagement = timeout(fetch_timeout, content.fetch_engagement(&item.id)).await;
            (item, engagement)
        })
        .buffer_unordered(config.max_concurrency.max(1))
        .collect()
        .await;

    for (item, engagement) in fetched {
        let engagement = match engagement {
            Ok(Ok(engagement)) => engagement,
            Ok(Err(e)) => {
                debug!(uri = %item.id, error = %e, "Skipping item, engagement fetch failed");
                summary.skipped += 1;
                continue;
            }
            Err(_) => {
                debug!(uri = %item.id, "Skipping item, engagement fetch timed out");
                summary.skipped += 1;
                continue;
            }
        };

        let rescored = RankedItem {
            score: score_item(&item, engagement, now_ms),
            last_scored: now_ms,
            ..item
        };
        store.upsert_score(&rescored).await?;
        summary.refreshed += 1;
    }

    metrics::record_refresh(summary.selected, summary.refreshed, summary.skipped);
    if summary.skipped > 0 {
        info!(skipped = summary.skipped, "Some items were not rescored this cycle");
    }
    Ok(summary)
}
