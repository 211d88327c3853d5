//! Cursor pagination over the ranked set.
//!
//! Ranking order is the total order `(score DESC, first_indexed DESC, id DESC)`.
//! The id breaks ties between items with equal score and equal indexing
//! time, so every position in the ranking is unique and a cursor never skips
//! or repeats an item.
//!
//! Cursor format: URL-safe base64 of `"{score}::{first_indexed}::{id}"`.

use crate::error::CursorError;
use crate::models::RankedItem;
use base64::{engine::general_purpose, Engine as _};
use std::cmp::Ordering;

/// Ranking position of the last item served on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPosition {
    pub score: f64,
    pub first_indexed: i64,
    pub id: String,
}

impl FeedPosition {
    pub fn of(item: &RankedItem) -> Self {
        Self {
            score: item.score,
            first_indexed: item.first_indexed,
            id: item.id.clone(),
        }
    }

    /// True when `item` comes strictly later in the ranking than this position.
    pub fn precedes(&self, item: &RankedItem) -> bool {
        ranking_order(
            (self.score, self.first_indexed, self.id.as_str()),
            (item.score, item.first_indexed, item.id.as_str()),
        ) == Ordering::Less
    }

    pub fn encode(&self) -> String {
        // f64 Display prints the shortest string that parses back to the same value.
        let raw = format!("{}::{}::{}", self.score, self.first_indexed, self.id);
        general_purpose::URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(cursor: &str) -> Result<Self, CursorError> {
        let bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(cursor.trim())
            .map_err(|_| CursorError::Encoding)?;
        let raw = String::from_utf8(bytes).map_err(|_| CursorError::Encoding)?;

        let mut parts = raw.splitn(3, "::");
        let score: f64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .filter(|s: &f64| s.is_finite())
            .ok_or(CursorError::Field("score"))?;
        let first_indexed: i64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(CursorError::Field("first_indexed"))?;
        let id = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(CursorError::Field("id"))?;

        Ok(Self {
            score,
            first_indexed,
            id: id.to_string(),
        })
    }
}

/// Ordering of two ranking keys where `Less` means "ranked higher".
pub fn ranking_order(a: (f64, i64, &str), b: (f64, i64, &str)) -> Ordering {
    b.0.total_cmp(&a.0)
        .then_with(|| b.1.cmp(&a.1))
        .then_with(|| b.2.cmp(a.2))
}

/// Sorts items into serving order.
pub fn sort_for_serving(items: &mut [RankedItem]) {
    items.sort_by(|a, b| {
        ranking_order(
            (a.score, a.first_indexed, a.id.as_str()),
            (b.score, b.first_indexed, b.id.as_str()),
        )
    });
}
