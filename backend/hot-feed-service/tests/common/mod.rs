#![allow(dead_code)]

use async_trait::async_trait;
use hot_feed::clients::{Classifier, ContentSource};
use hot_feed::error::{ClassifierError, FetchError};
use hot_feed::models::{Engagement, RankedItem};
use mockall::mock;
use std::time::Duration;

pub const HOUR_MS: i64 = 3_600_000;
pub const MINUTE_MS: i64 = 60_000;

/// Fixed "now" so tests do not depend on the wall clock.
pub const NOW_MS: i64 = 1_717_000_000_000;

mock! {
    pub Content {}

    #[async_trait]
    impl ContentSource for Content {
        async fn fetch_engagement(&self, uri: &str) -> Result<Engagement, FetchError>;
        async fn fetch_text(&self, uri: &str) -> Result<String, FetchError>;
    }
}

mock! {
    pub TopicClassifier {}

    #[async_trait]
    impl Classifier for TopicClassifier {
        async fn is_on_topic(&self, text: &str) -> Result<bool, ClassifierError>;
    }
}

/// Content source that never answers within any reasonable timeout.
pub struct StalledContent;

#[async_trait]
impl ContentSource for StalledContent {
    async fn fetch_engagement(&self, _uri: &str) -> Result<Engagement, FetchError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Engagement::new(1_000, 1_000))
    }

    async fn fetch_text(&self, _uri: &str) -> Result<String, FetchError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(String::new())
    }
}

pub fn post_uri(rkey: &str) -> String {
    format!("at://did:plc:author/app.bsky.feed.post/{}", rkey)
}

/// Unscored item indexed `age_ms` before [`NOW_MS`].
pub fn fresh_item(rkey: &str, age_ms: i64) -> RankedItem {
    RankedItem::new(post_uri(rkey), format!("cid-{}", rkey), NOW_MS - age_ms, 0.0, false)
}

pub fn scored_item(rkey: &str, score: f64, first_indexed: i64) -> RankedItem {
    RankedItem {
        score,
        last_scored: first_indexed,
        ..RankedItem::new(post_uri(rkey), format!("cid-{}", rkey), first_indexed, 0.0, false)
    }
}

pub fn flagged_item(rkey: &str, score: f64) -> RankedItem {
    RankedItem {
        score,
        last_scored: NOW_MS - MINUTE_MS,
        ..RankedItem::new(post_uri(rkey), format!("cid-{}", rkey), NOW_MS - HOUR_MS, 0.0, true)
    }
}
