//! Time-decayed relevance score.
//!
//! score = engagement / (age_hours + 2) ^ 2.8
//!
//! The two-hour offset keeps the denominator away from zero for brand-new
//! posts, and the exponent makes young posts with little engagement sink
//! quickly while strong early engagement still dominates.

use crate::models::{Engagement, RankedItem};

pub const AGE_OFFSET_HOURS: f64 = 2.0;
pub const GRAVITY: f64 = 2.8;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Raw scoring function. `engagement` already includes the item's boost.
pub fn calculate_score(age_hours: f64, engagement: f64) -> f64 {
    // Clock skew can make an item look younger than zero.
    let age_hours = age_hours.max(0.0);
    engagement / (age_hours + AGE_OFFSET_HOURS).powf(GRAVITY)
}

pub fn age_hours(first_indexed_ms: i64, now_ms: i64) -> f64 {
    (now_ms - first_indexed_ms) as f64 / MS_PER_HOUR
}

/// Score for `item` at `now_ms` given freshly fetched counters.
pub fn score_item(item: &RankedItem, engagement: Engagement, now_ms: i64) -> f64 {
    calculate_score(
        age_hours(item.first_indexed, now_ms),
        engagement.total() as f64 + item.boost,
    )
}
