//! Storage for the ranked set and the stream subscription cursor.
//!
//! `ItemStore` is the seam between the ranking jobs and persistence. The
//! Postgres implementation backs production; the in-memory one serves tests
//! and `STORE_BACKEND=memory` runs.

pub mod memory_store;
pub mod pg_store;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::RankedItem;
use crate::services::pagination::FeedPosition;
use crate::services::tiers::RefreshTier;
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

pub use memory_store::InMemoryStore;
pub use pg_store::PgStore;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Inserts items whose id is not yet present. Existing rows are left
    /// untouched. Returns the number of rows actually inserted.
    async fn insert_if_absent(&self, items: &[RankedItem]) -> Result<u64>;

    /// Deletes by id; unknown ids are ignored. Returns the number deleted.
    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64>;

    /// Writes `score` and `last_scored` for `item.id`, inserting the full row
    /// if it is absent. Other columns of an existing row are never changed.
    async fn upsert_score(&self, item: &RankedItem) -> Result<()>;

    /// Items due for rescoring under any of `tiers` at `now_ms`.
    async fn select_due_for_refresh(
        &self,
        now_ms: i64,
        tiers: &[RefreshTier],
    ) -> Result<Vec<RankedItem>>;

    /// Up to `limit` flagged items, highest score first.
    async fn select_needing_classification(&self, limit: usize) -> Result<Vec<RankedItem>>;

    async fn clear_classification_flag(&self, ids: &[String]) -> Result<u64>;

    /// Deletes items indexed before `cutoff_ms` whose score is below `score_floor`.
    async fn delete_stale(&self, cutoff_ms: i64, score_floor: f64) -> Result<u64>;

    /// Up to `limit` items with a positive score in serving order, starting
    /// strictly after `after` when given.
    async fn page_ranked(
        &self,
        limit: usize,
        after: Option<&FeedPosition>,
    ) -> Result<Vec<RankedItem>>;

    async fn get(&self, id: &str) -> Result<Option<RankedItem>>;
}

/// Resumption cursor of the event stream, keyed by service name.
#[async_trait]
pub trait SubscriptionStateStore: Send + Sync {
    async fn get_cursor(&self, service: &str) -> Result<Option<i64>>;

    /// Persists `cursor` unless a larger one is already stored.
    async fn update_cursor(&self, service: &str, cursor: i64) -> Result<()>;
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        "Database pool created"
    );
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    info!("Database migrations completed successfully");
    Ok(())
}
