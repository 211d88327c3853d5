//! In-process item store with the same semantics as the Postgres store.

use super::{ItemStore, SubscriptionStateStore};
use crate::error::Result;
use crate::models::RankedItem;
use crate::services::pagination::{sort_for_serving, FeedPosition};
use crate::services::tiers::{is_due, RefreshTier};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryStore {
    items: Mutex<HashMap<String, RankedItem>>,
    cursors: Mutex<HashMap<String, i64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored item in serving order, including unscored ones.
    pub fn snapshot(&self) -> Vec<RankedItem> {
        let mut items: Vec<RankedItem> = self.lock_items().values().cloned().collect();
        sort_for_serving(&mut items);
        items
    }

    fn lock_items(&self) -> std::sync::MutexGuard<'_, HashMap<String, RankedItem>> {
        // A panic while holding the lock cannot leave a half-written item.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_cursors(&self) -> std::sync::MutexGuard<'_, HashMap<String, i64>> {
        self.cursors.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn insert_if_absent(&self, items: &[RankedItem]) -> Result<u64> {
        let mut stored = self.lock_items();
        let mut inserted = 0;
        for item in items {
            if !stored.contains_key(&item.id) {
                stored.insert(item.id.clone(), item.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        let mut stored = self.lock_items();
        Ok(ids.iter().filter(|id| stored.remove(*id).is_some()).count() as u64)
    }

    async fn upsert_score(&self, item: &RankedItem) -> Result<()> {
        let mut stored = self.lock_items();
        match stored.get_mut(&item.id) {
            Some(existing) => {
                existing.score = item.score;
                existing.last_scored = item.last_scored;
            }
            None => {
                stored.insert(item.id.clone(), item.clone());
            }
        }
        Ok(())
    }

    async fn select_due_for_refresh(
        &self,
        now_ms: i64,
        tiers: &[RefreshTier],
    ) -> Result<Vec<RankedItem>> {
        Ok(self
            .lock_items()
            .values()
            .filter(|item| is_due(tiers, item.age_ms(now_ms), item.since_scored_ms(now_ms)))
            .cloned()
            .collect())
    }

    async fn select_needing_classification(&self, limit: usize) -> Result<Vec<RankedItem>> {
        let mut flagged: Vec<RankedItem> = self
            .lock_items()
            .values()
            .filter(|item| item.needs_classification)
            .cloned()
            .collect();
        sort_for_serving(&mut flagged);
        flagged.truncate(limit);
        Ok(flagged)
    }

    async fn clear_classification_flag(&self, ids: &[String]) -> Result<u64> {
        let mut stored = self.lock_items();
        let mut cleared = 0;
        for id in ids {
            if let Some(item) = stored.get_mut(id) {
                if item.needs_classification {
                    item.needs_classification = false;
                    cleared += 1;
                }
            }
        }
        Ok(cleared)
    }

    async fn delete_stale(&self, cutoff_ms: i64, score_floor: f64) -> Result<u64> {
        let mut stored = self.lock_items();
        let before = stored.len();
        stored.retain(|_, item| !(item.first_indexed < cutoff_ms && item.score < score_floor));
        Ok((before - stored.len()) as u64)
    }

    async fn page_ranked(
        &self,
        limit: usize,
        after: Option<&FeedPosition>,
    ) -> Result<Vec<RankedItem>> {
        let mut eligible: Vec<RankedItem> = self
            .lock_items()
            .values()
            .filter(|item| item.score > 0.0)
            .filter(|item| after.map_or(true, |position| position.precedes(item)))
            .cloned()
            .collect();
        sort_for_serving(&mut eligible);
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn get(&self, id: &str) -> Result<Option<RankedItem>> {
        Ok(self.lock_items().get(id).cloned())
    }
}

#[async_trait]
impl SubscriptionStateStore for InMemoryStore {
    async fn get_cursor(&self, service: &str) -> Result<Option<i64>> {
        Ok(self.lock_cursors().get(service).copied())
    }

    async fn update_cursor(&self, service: &str, cursor: i64) -> Result<()> {
        let mut cursors = self.lock_cursors();
        let entry = cursors.entry(service.to_string()).or_insert(cursor);
        *entry = (*entry).max(cursor);
        Ok(())
    }
}
