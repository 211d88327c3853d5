//! PostgreSQL item store.
//!
//! Every operation is a single statement, so each is atomic on its own and
//! no lock is held across an await point.

use super::{ItemStore, SubscriptionStateStore};
use crate::error::{AppError, Result};
use crate::models::RankedItem;
use crate::services::pagination::FeedPosition;
use crate::services::tiers::RefreshTier;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::error;

/// Postgres caps bind parameters per statement at 65535.
const INSERT_CHUNK: usize = 1000;

const ITEM_COLUMNS: &str =
    "id, content_version, first_indexed, score, last_scored, boost, needs_classification";

fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        error!(operation, error = %e, "Item store query failed");
        AppError::Database(e.to_string())
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ItemStore for PgStore {
    async fn insert_if_absent(&self, items: &[RankedItem]) -> Result<u64> {
        let mut inserted = 0;
        for chunk in items.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO ranked_items ({}) ", ITEM_COLUMNS));
            builder.push_values(chunk, |mut row, item| {
                row.push_bind(item.id.clone())
                    .push_bind(item.content_version.clone())
                    .push_bind(item.first_indexed)
                    .push_bind(item.score)
                    .push_bind(item.last_scored)
                    .push_bind(item.boost)
                    .push_bind(item.needs_classification);
            });
            builder.push(" ON CONFLICT (id) DO NOTHING");

            let result = builder
                .build()
                .execute(&self.pool)
                .await
                .map_err(db_error("insert_if_absent"))?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM ranked_items WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_by_ids"))?;
        Ok(result.rows_affected())
    }

    async fn upsert_score(&self, item: &RankedItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ranked_items
                (id, content_version, first_indexed, score, last_scored, boost, needs_classification)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET score = EXCLUDED.score,
                last_scored = EXCLUDED.last_scored
            "#,
        )
        .bind(&item.id)
        .bind(&item.content_version)
        .bind(item.first_indexed)
        .bind(item.score)
        .bind(item.last_scored)
        .bind(item.boost)
        .bind(item.needs_classification)
        .execute(&self.pool)
        .await
        .map_err(db_error("upsert_score"))?;
        Ok(())
    }

    async fn select_due_for_refresh(
        &self,
        now_ms: i64,
        tiers: &[RefreshTier],
    ) -> Result<Vec<RankedItem>> {
        if tiers.is_empty() {
            return Ok(Vec::new());
        }

        // age < threshold  <=>  first_indexed > now - threshold
        // since >= delay   <=>  last_scored <= now - delay
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM ranked_items WHERE ", ITEM_COLUMNS));
        let mut predicates = builder.separated(" OR ");
        for tier in tiers {
            predicates.push("(first_indexed > ");
            predicates.push_bind_unseparated(now_ms.saturating_sub(tier.age_threshold_ms()));
            predicates.push_unseparated(" AND last_scored <= ");
            predicates.push_bind_unseparated(now_ms.saturating_sub(tier.refresh_delay_ms()));
            predicates.push_unseparated(")");
        }

        builder
            .build_query_as::<RankedItem>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("select_due_for_refresh"))
    }

    async fn select_needing_classification(&self, limit: usize) -> Result<Vec<RankedItem>> {
        sqlx::query_as::<_, RankedItem>(&format!(
            r#"
            SELECT {}
            FROM ranked_items
            WHERE needs_classification
            ORDER BY score DESC, first_indexed DESC, id DESC
            LIMIT $1
            "#,
            ITEM_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("select_needing_classification"))
    }

    async fn clear_classification_flag(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE ranked_items SET needs_classification = FALSE \
             WHERE id = ANY($1) AND needs_classification",
        )
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(db_error("clear_classification_flag"))?;
        Ok(result.rows_affected())
    }

    async fn delete_stale(&self, cutoff_ms: i64, score_floor: f64) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM ranked_items WHERE first_indexed < $1 AND score < $2")
                .bind(cutoff_ms)
                .bind(score_floor)
                .execute(&self.pool)
                .await
                .map_err(db_error("delete_stale"))?;
        Ok(result.rows_affected())
    }

    async fn page_ranked(
        &self,
        limit: usize,
        after: Option<&FeedPosition>,
    ) -> Result<Vec<RankedItem>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM ranked_items WHERE score > 0",
            ITEM_COLUMNS
        ));
        if let Some(position) = after {
            // Row comparison matches the all-descending sort key.
            builder
                .push(" AND (score, first_indexed, id) < (")
                .push_bind(position.score)
                .push(", ")
                .push_bind(position.first_indexed)
                .push(", ")
                .push_bind(position.id.clone())
                .push(")");
        }
        builder
            .push(" ORDER BY score DESC, first_indexed DESC, id DESC LIMIT ")
            .push_bind(limit as i64);

        builder
            .build_query_as::<RankedItem>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("page_ranked"))
    }

    async fn get(&self, id: &str) -> Result<Option<RankedItem>> {
        sqlx::query_as::<_, RankedItem>(&format!(
            "SELECT {} FROM ranked_items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get"))
    }
}

#[async_trait]
impl SubscriptionStateStore for PgStore {
    async fn get_cursor(&self, service: &str) -> Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT cursor FROM subscription_state WHERE service = $1")
            .bind(service)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_cursor"))
    }

    async fn update_cursor(&self, service: &str, cursor: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO subscription_state (service, cursor)
            VALUES ($1, $2)
            ON CONFLICT (service) DO UPDATE
            SET cursor = GREATEST(subscription_state.cursor, EXCLUDED.cursor)
            "#,
        )
        .bind(service)
        .bind(cursor)
        .execute(&self.pool)
        .await
        .map_err(db_error("update_cursor"))?;
        Ok(())
    }
}
