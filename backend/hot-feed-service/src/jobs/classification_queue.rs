//! Classification Queue Background Job
//!
//! Resolves flagged items with the topic classifier, highest score first.
//! Off-topic items are deleted; every item that got a verdict has its flag
//! cleared. Items whose text could not be fetched, or whose classifier call
//! failed, keep the flag and are picked up again by a later cycle.

use crate::clients::{Classifier, ContentSource};
use crate::config::ClassifierConfig;
use crate::db::ItemStore;
use crate::error::Result;
use crate::metrics::jobs as metrics;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, warn};

/// In-flight text fetches and classifier calls per cycle
const MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationSummary {
    pub selected: usize,
    pub on_topic: Vec<String>,
    pub off_topic: Vec<String>,
    pub fetch_failed: usize,
    pub classifier_failed: usize,
    pub deleted: u64,
    pub cleared: u64,
}

pub async fn start_classification_queue(
    store: Arc<dyn ItemStore>,
    content: Arc<dyn ContentSource>,
    classifier: Arc<dyn Classifier>,
    config: ClassifierConfig,
) {
    tracing::info!(
        interval_secs = config.interval.as_secs(),
        batch_size = config.batch_size,
        model = %config.model,
        "Starting classification queue background job"
    );

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let cycle_start = Instant::now();
        match run_classification_cycle(
            store.as_ref(),
            content.as_ref(),
            classifier.as_ref(),
            config.batch_size,
            config.timeout,
        )
        .await
        {
            Ok(summary) => {
                metrics::record_job_run("classification_queue", "success", cycle_start.elapsed());
                tracing::info!(
                    selected = summary.selected,
                    on_topic = summary.on_topic.len(),
                    off_topic = summary.off_topic.len(),
                    fetch_failed = summary.fetch_failed,
                    classifier_failed = summary.classifier_failed,
                    deleted = summary.deleted,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Classification cycle completed"
                );
            }
            Err(e) => {
                metrics::record_job_run("classification_queue", "error", cycle_start.elapsed());
                tracing::error!(
                    error = %e,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Classification cycle failed"
                );
            }
        }
    }
}

enum Verdict {
    OnTopic,
    OffTopic,
    FetchFailed,
    ClassifierFailed,
}

pub async fn run_classification_cycle(
    store: &dyn ItemStore,
    content: &dyn ContentSource,
    classifier: &dyn Classifier,
    batch_size: usize,
    call_timeout: Duration,
) -> Result<ClassificationSummary> {
    let flagged = store.select_needing_classification(batch_size).await?;
    let mut summary = ClassificationSummary {
        selected: flagged.len(),
        ..ClassificationSummary::default()
    };
    if flagged.is_empty() {
        return Ok(summary);
    }

    let verdicts: Vec<(String, Verdict)> = stream::iter(flagged)
        .map(|item| async move {
            let text = match timeout(call_timeout, content.fetch_text(&item.id)).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    debug!(uri = %item.id, error = %e, "Text fetch failed, item stays flagged");
                    return (item.id, Verdict::FetchFailed);
                }
                Err(_) => {
                    debug!(uri = %item.id, "Text fetch timed out, item stays flagged");
                    return (item.id, Verdict::FetchFailed);
                }
            };

            let verdict = match timeout(call_timeout, classifier.is_on_topic(&text)).await {
                Ok(Ok(true)) => Verdict::OnTopic,
                Ok(Ok(false)) => Verdict::OffTopic,
                Ok(Err(e)) => {
                    warn!(uri = %item.id, error = %e, "Classifier call failed, item stays flagged");
                    Verdict::ClassifierFailed
                }
                Err(_) => {
                    warn!(uri = %item.id, "Classifier call timed out, item stays flagged");
                    Verdict::ClassifierFailed
                }
            };
            (item.id, verdict)
        })
        .buffer_unordered(MAX_CONCURRENCY)
        .collect()
        .await;

    for (id, verdict) in verdicts {
        match verdict {
            Verdict::OnTopic => summary.on_topic.push(id),
            Verdict::OffTopic => summary.off_topic.push(id),
            Verdict::FetchFailed => summary.fetch_failed += 1,
            Verdict::ClassifierFailed => summary.classifier_failed += 1,
        }
    }

    if !summary.off_topic.is_empty() {
        summary.deleted = store.delete_by_ids(&summary.off_topic).await?;
    }

    let evaluated: Vec<String> = summary
        .on_topic
        .iter()
        .chain(summary.off_topic.iter())
        .cloned()
        .collect();
    if !evaluated.is_empty() {
        summary.cleared = store.clear_classification_flag(&evaluated).await?;
    }

    metrics::record_classification("on_topic", summary.on_topic.len() as u64);
    metrics::record_classification("off_topic", summary.off_topic.len() as u64);
    metrics::record_classification("fetch_failed", summary.fetch_failed as u64);
    metrics::record_classification("classifier_failed", summary.classifier_failed as u64);

    Ok(summary)
}
