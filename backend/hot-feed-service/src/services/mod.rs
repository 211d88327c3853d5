//! Ranking services: pure scoring and tiering, pagination, and the query path.

pub mod feed_query;
pub mod pagination;
pub mod refresh_trigger;
pub mod scoring;
pub mod tiers;

pub use feed_query::hot_page;
pub use refresh_trigger::{refresh_queue, RefreshRequests, RefreshTrigger};
