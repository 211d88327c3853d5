//! Jetstream subscription.
//!
//! Frames are decoded into an [`OperationBatch`] that is flushed by size or
//! age. A flush applies the batch and then persists the batch's cursor, so a
//! crash or a failed flush replays from the last persisted position
//! (at-least-once; ingestion is idempotent).

use crate::config::{FirehoseConfig, SettingsHandle};
use crate::consumers::ingest::handle_operations;
use crate::consumers::jetstream::{decode_event, OperationBatch, POST_COLLECTION};
use crate::db::{ItemStore, SubscriptionStateStore};
use crate::error::AppError;
use crate::metrics::ingest as metrics;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FirehoseError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("stream closed by server")]
    Closed,

    #[error("failed to flush batch: {0}")]
    Flush(#[from] AppError),
}

pub struct FirehoseConsumer {
    config: FirehoseConfig,
    items: Arc<dyn ItemStore>,
    state: Arc<dyn SubscriptionStateStore>,
    settings: SettingsHandle,
}

impl FirehoseConsumer {
    pub fn new(
        config: FirehoseConfig,
        items: Arc<dyn ItemStore>,
        state: Arc<dyn SubscriptionStateStore>,
        settings: SettingsHandle,
    ) -> Self {
        Self {
            config,
            items,
            state,
            settings,
        }
    }

    /// Runs forever, reconnecting with exponential backoff.
    pub async fn run(self) {
        let mut backoff = self.config.reconnect_backoff;
        loop {
            let cursor = match self.state.get_cursor(&self.config.service_name).await {
                Ok(cursor) => cursor,
                Err(e) => {
                    error!(error = %e, "Failed to load firehose cursor");
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff, self.config.max_reconnect_backoff);
                    continue;
                }
            };

            let url = subscribe_url(&self.config.endpoint, cursor);
            info!(url = %url, cursor = ?cursor, "Connecting to firehose");

            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((stream, _)) => {
                    backoff = self.config.reconnect_backoff;
                    match self.consume(stream).await {
                        FirehoseError::Closed => warn!("Firehose closed the connection"),
                        e => error!(error = %e, "Firehose session ended"),
                    }
                }
                Err(e) => {
                    let e = FirehoseError::Connect(e.to_string());
                    error!(error = %e, "Firehose connection failed");
                }
            }

            metrics::record_reconnect();
            tokio::time::sleep(backoff).await;
            backoff = next_backoff(backoff, self.config.max_reconnect_backoff);
        }
    }

    /// Consumes one connection until it fails or closes. The pending batch is
    /// flushed on a clean close; on any error it is dropped and replayed
    /// after reconnecting.
    pub async fn consume<S, E>(&self, stream: S) -> FirehoseError
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut stream = stream;
        let mut batch = OperationBatch::new();
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match decode_event(&text) {
                                Ok(event) => batch.add(event),
                                Err(malformed) => {
                                    debug!(reason = %malformed.reason, "Dropping malformed event");
                                    batch.add_malformed(malformed);
                                }
                            }
                            if batch.should_flush_by_size(self.config.batch_size) {
                                if let Err(e) = self.flush(&mut batch).await {
                                    return e;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            if let Err(e) = self.flush(&mut batch).await {
                                return e;
                            }
                            return FirehoseError::Closed;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return FirehoseError::Stream(e.to_string()),
                    }
                }
                _ = ticker.tick() => {
                    if batch.should_flush_by_time(self.config.flush_interval) {
                        if let Err(e) = self.flush(&mut batch).await {
                            return e;
                        }
                    }
                }
            }
        }
    }

    async fn flush(&self, batch: &mut OperationBatch) -> Result<(), FirehoseError> {
        if batch.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(batch);
        if pending.malformed() > 0 {
            metrics::record_operations("malformed", pending.malformed());
        }

        let settings = self.settings.snapshot();
        let now_ms = chrono::Utc::now().timestamp_millis();
        handle_operations(self.items.as_ref(), &settings, pending.operations(), now_ms).await?;

        if let Some(cursor) = pending.cursor() {
            self.state
                .update_cursor(&self.config.service_name, cursor)
                .await?;
            metrics::set_cursor(cursor);
        }
        Ok(())
    }
}

pub fn subscribe_url(endpoint: &str, cursor: Option<i64>) -> String {
    let mut url = format!("{}?wantedCollections={}", endpoint, POST_COLLECTION);
    if let Some(cursor) = cursor {
        url.push_str(&format!("&cursor={}", cursor));
    }
    url
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}
