//! Event stream ingestion.

pub mod firehose_consumer;
pub mod ingest;
pub mod jetstream;

pub use firehose_consumer::{FirehoseConsumer, FirehoseError};
pub use ingest::{handle_operations, IngestSummary};
