//! Hot feed page assembly.

use crate::db::ItemStore;
use crate::error::Result;
use crate::models::{FeedSkeletonResponse, SkeletonFeedPost};
use crate::services::pagination::FeedPosition;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;

/// Applies the default and clamps into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> usize {
    match limit {
        None => DEFAULT_LIMIT,
        Some(limit) => limit.clamp(1, MAX_LIMIT as i64) as usize,
    }
}

/// One page of the hot feed.
///
/// One extra row is read past `limit`; the cursor is only returned when that
/// row exists, so the page that exhausts the ranked set carries no cursor.
pub async fn hot_page(
    store: &dyn ItemStore,
    limit: usize,
    cursor: Option<&str>,
) -> Result<FeedSkeletonResponse> {
    let after = cursor.map(FeedPosition::decode).transpose()?;

    let mut items = store.page_ranked(limit + 1, after.as_ref()).await?;
    let has_more = items.len() > limit;
    items.truncate(limit);

    let cursor = if has_more {
        items.last().map(|last| FeedPosition::of(last).encode())
    } else {
        None
    };

    Ok(FeedSkeletonResponse {
        cursor,
        feed: items
            .into_iter()
            .map(|item| SkeletonFeedPost { post: item.id })
            .collect(),
    })
}
