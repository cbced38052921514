//! The Sink side of the pipeline: accepts readings over HTTP, optionally
//! rate-limits them, batches them, and durably appends them to a WAL.

pub mod ingest;
pub mod server;
pub mod worker;

pub use ingest::{ChannelIngestor, Ingestor, RateLimitedIngestor, TelemetryItem};
pub use worker::{BatchConfig, Worker};
