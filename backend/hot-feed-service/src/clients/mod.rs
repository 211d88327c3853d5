//! Outbound collaborators: the content source (engagement counters and post
//! text) and the topic classifier.

pub mod appview;
pub mod openai;

use crate::error::{ClassifierError, FetchError};
use crate::models::Engagement;
use async_trait::async_trait;

pub use appview::AppViewClient;
pub use openai::OpenAiClassifier;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Current like and repost counters of the post at `uri`.
    async fn fetch_engagement(&self, uri: &str) -> Result<Engagement, FetchError>;

    async fn fetch_text(&self, uri: &str) -> Result<String, FetchError>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Whether `text` is about the configured topic.
    async fn is_on_topic(&self, text: &str) -> Result<bool, ClassifierError>;
}
