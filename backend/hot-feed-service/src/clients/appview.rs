//! AppView client for `app.bsky.feed.getPostThread`.

use super::ContentSource;
use crate::config::AppViewConfig;
use crate::error::FetchError;
use crate::models::Engagement;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use tracing::debug;

pub struct AppViewClient {
    client: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GetPostThreadResponse {
    thread: ThreadView,
}

#[derive(Debug, Deserialize)]
struct ThreadView {
    /// Absent for `notFoundPost` and `blockedPost` views
    post: Option<PostView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    #[serde(default)]
    like_count: Option<i64>,
    #[serde(default)]
    repost_count: Option<i64>,
    #[serde(default)]
    record: PostRecord,
}

#[derive(Debug, Default, Deserialize)]
struct PostRecord {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XrpcError {
    error: Option<String>,
}

impl AppViewClient {
    pub fn new(config: &AppViewConfig) -> Result<Self, FetchError> {
        let client = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_post(&self, uri: &str) -> Result<PostView, FetchError> {
        let response = self
            .client
            .get(format!("{}/xrpc/app.bsky.feed.getPostThread", self.base_url))
            .query(&[("uri", uri), ("depth", "0"), ("parentHeight", "0")])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            // A deleted post comes back as 400 {"error": "NotFound"}.
            if status == StatusCode::BAD_REQUEST {
                let body: Option<XrpcError> = response.json().await.ok();
                if body.and_then(|b| b.error).as_deref() == Some("NotFound") {
                    return Err(FetchError::NotFound);
                }
            }
            debug!(uri, status = status.as_u16(), "getPostThread failed");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: GetPostThreadResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        body.thread.post.ok_or(FetchError::NotFound)
    }
}

fn map_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}

#[async_trait]
impl ContentSource for AppViewClient {
    async fn fetch_engagement(&self, uri: &str) -> Result<Engagement, FetchError> {
        let post = self.get_post(uri).await?;
        Ok(Engagement::new(
            post.like_count.unwrap_or(0),
            post.repost_count.unwrap_or(0),
        ))
    }

    async fn fetch_text(&self, uri: &str) -> Result<String, FetchError> {
        let post = self.get_post(uri).await?;
        post.record.text.ok_or(FetchError::MissingText)
    }
}
