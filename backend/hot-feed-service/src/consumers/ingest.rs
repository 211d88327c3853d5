//! Applies one batch of stream operations to the item store.

use crate::config::FilterSettings;
use crate::consumers::jetstream::OperationsByType;
use crate::db::ItemStore;
use crate::error::Result;
use crate::filter::{evaluate, FilterDecision};
use crate::metrics::ingest as metrics;
use crate::models::RankedItem;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub deleted: u64,
    pub accepted: usize,
    pub rejected: usize,
    pub inserted: u64,
}

/// Deletes run before inserts so a replayed create/delete pair for the same
/// post leaves nothing behind. Inserts never overwrite an existing item.
pub async fn handle_operations(
    store: &dyn ItemStore,
    settings: &FilterSettings,
    operations: &OperationsByType,
    now_ms: i64,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    if !operations.deletes.is_empty() {
        summary.deleted = store.delete_by_ids(&operations.deletes).await?;
        metrics::record_operations("delete", operations.deletes.len() as u64);
    }

    let mut candidates: Vec<RankedItem> = Vec::new();
    for create in &operations.creates {
        match evaluate(create, settings) {
            FilterDecision::Accept(candidate) => {
                metrics::record_filter_decision("accepted");
                debug!(
                    uri = %create.uri,
                    keyword = %candidate.matched_keyword,
                    boost = candidate.boost,
                    needs_classification = candidate.needs_classification,
                    "Post accepted"
                );
                candidates.push(candidate.into_item(create, now_ms));
            }
            FilterDecision::Reject(reason) => {
                metrics::record_filter_decision(reason.as_str());
                summary.rejected += 1;
            }
        }
    }
    metrics::record_operations("create", operations.creates.len() as u64);

    summary.accepted = candidates.len();
    if !candidates.is_empty() {
        summary.inserted = store.insert_if_absent(&candidates).await?;
    }

    if summary.deleted > 0 || summary.inserted > 0 {
        info!(
            deleted = summary.deleted,
            accepted = summary.accepted,
            inserted = summary.inserted,
            rejected = summary.rejected,
            settings_version = settings.version,
            "Applied stream batch"
        );
    }

    Ok(summary)
}
