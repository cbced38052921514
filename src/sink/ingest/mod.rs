//! Ingestion chain: a decorator stack terminating in a [`channel::ChannelIngestor`],
//! optionally wrapped by [`ratelimit::RateLimitedIngestor`].
//!
//! Grounded on `original_source/internal/application/sink/ingestor.go`'s
//! `TelemetryIngestor` interface.

pub mod channel;
pub mod ratelimit;

use crate::domain::Reading;
use crate::error::IngestError;
use async_trait::async_trait;

/// A reading plus its wire size in bytes, the unit the byte-rate rule
/// consumes tokens by.
#[derive(Debug, Clone)]
pub struct TelemetryItem {
    pub reading: Reading,
    pub size: usize,
}

#[async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(&self, item: TelemetryItem) -> Result<(), IngestError>;
    async fn close(&self) -> Result<(), IngestError>;
}

pub use channel::ChannelIngestor;
pub use ratelimit::RateLimitedIngestor;
