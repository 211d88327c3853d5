use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::db::ItemStore;
use crate::error::{AppError, Result};
use crate::services::feed_query::{clamp_limit, hot_page};
use crate::services::RefreshTrigger;

pub const FEED_GENERATOR_COLLECTION: &str = "app.bsky.feed.generator";

/// Record keys of the feeds this service publishes.
pub const ALGORITHMS: &[&str] = &["hot"];

#[derive(Debug, Deserialize)]
pub struct FeedSkeletonParams {
    pub feed: String,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

pub struct FeedHandlerState {
    pub store: Arc<dyn ItemStore>,
    pub refresh: RefreshTrigger,
    pub publisher_did: String,
}

/// Parses `at://{did}/{collection}/{rkey}`.
fn parse_feed_uri(uri: &str) -> Option<(&str, &str, &str)> {
    let rest = uri.strip_prefix("at://")?;
    let mut parts = rest.splitn(3, '/');
    let did = parts.next().filter(|s| !s.is_empty())?;
    let collection = parts.next().filter(|s| !s.is_empty())?;
    let rkey = parts.next().filter(|s| !s.is_empty() && !s.contains('/'))?;
    Some((did, collection, rkey))
}

/// Resolves the requested feed to one of [`ALGORITHMS`].
pub fn resolve_algorithm(feed: &str, publisher_did: &str) -> Result<&'static str> {
    let unsupported = || AppError::UnsupportedAlgorithm(format!("Unsupported feed: {}", feed));

    let (did, collection, rkey) = parse_feed_uri(feed).ok_or_else(unsupported)?;
    if did != publisher_did || collection != FEED_GENERATOR_COLLECTION {
        return Err(unsupported());
    }
    ALGORITHMS
        .iter()
        .copied()
        .find(|algorithm| *algorithm == rkey)
        .ok_or_else(unsupported)
}

#[get("/xrpc/app.bsky.feed.getFeedSkeleton")]
pub async fn get_feed_skeleton(
    query: web::Query<FeedSkeletonParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let algorithm = resolve_algorithm(&query.feed, &state.publisher_did)?;
    let limit = clamp_limit(query.limit);
    let cursor = query.cursor.as_deref().filter(|c| !c.is_empty());

    let page = hot_page(state.store.as_ref(), limit, cursor).await?;

    // Only a page that was served asks for a refresh; a failed read above
    // returns early on purpose. Never awaited; a pending request absorbs this one.
    let queued = state.refresh.request();
    debug!(
        algorithm,
        limit,
        returned = page.feed.len(),
        has_more = page.cursor.is_some(),
        refresh_queued = queued,
        "Served feed skeleton"
    );

    Ok(HttpResponse::Ok().json(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLISHER: &str = "did:plc:publisher";

    #[test]
    fn test_resolve_known_algorithm() {
        let feed = format!("at://{}/app.bsky.feed.generator/hot", PUBLISHER);
        assert_eq!(resolve_algorithm(&feed, PUBLISHER).unwrap(), "hot");
    }

    #[test]
    fn test_reject_foreign_or_unknown_feeds() {
        for feed in [
            "at://did:plc:someone-else/app.bsky.feed.generator/hot".to_string(),
            format!("at://{}/app.bsky.feed.generator/cold", PUBLISHER),
            format!("at://{}/app.bsky.feed.post/hot", PUBLISHER),
            format!("at://{}/app.bsky.feed.generator/hot/extra", PUBLISHER),
            "hot".to_string(),
            String::new(),
        ] {
            assert!(
                matches!(
                    resolve_algorithm(&feed, PUBLISHER),
                    Err(AppError::UnsupportedAlgorithm(_))
                ),
                "feed {:?} should be unsupported",
                feed
            );
        }
    }
}
