use serde::{Deserialize, Serialize};

/// A post admitted into the ranked set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RankedItem {
    /// AT-URI of the source post
    pub id: String,
    /// CID of the record at indexing time
    pub content_version: String,
    /// Milliseconds since epoch
    pub first_indexed: i64,
    pub score: f64,
    /// Milliseconds since epoch, 0 when never scored
    pub last_scored: i64,
    /// Fixed at ingestion, never recomputed
    pub boost: f64,
    pub needs_classification: bool,
}

impl RankedItem {
    /// Fresh, unscored item as produced by the filter pipeline.
    pub fn new(
        id: impl Into<String>,
        content_version: impl Into<String>,
        first_indexed: i64,
        boost: f64,
        needs_classification: bool,
    ) -> Self {
        Self {
            id: id.into(),
            content_version: content_version.into(),
            first_indexed,
            score: 0.0,
            last_scored: 0,
            boost,
            needs_classification,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.first_indexed
    }

    pub fn since_scored_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.last_scored
    }
}

/// Engagement counters reported by the content source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub like_count: i64,
    pub repost_count: i64,
}

impl Engagement {
    pub fn new(like_count: i64, repost_count: i64) -> Self {
        Self {
            like_count,
            repost_count,
        }
    }

    pub fn total(&self) -> i64 {
        self.like_count + self.repost_count
    }
}

/// A decoded post creation from the event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PostCreate {
    pub uri: String,
    pub cid: String,
    pub text: String,
    pub langs: Option<Vec<String>>,
    pub is_reply: bool,
}

/// One entry of a feed skeleton page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonFeedPost {
    pub post: String,
}

/// `app.bsky.feed.getFeedSkeleton` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSkeletonResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub feed: Vec<SkeletonFeedPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub uri: String,
}

/// `app.bsky.feed.describeFeedGenerator` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeFeedGeneratorResponse {
    pub did: String,
    pub feeds: Vec<FeedDescriptor>,
}
