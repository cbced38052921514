//! Error types for the telemetry pipeline, one enum per subsystem boundary
//! — following the teacher's `StreamError`/`ProducerError` split rather
//! than a single crate-wide error.

use std::time::Duration;
use thiserror::Error;

/// Errors from the Node/Sink configuration layer.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("node.rate must be > 0")]
    NodeRateNotPositive,
    #[error("node.queue-size must be > 0")]
    NodeQueueSizeNotPositive,
    #[error("unsupported transport.type: {0:?}")]
    UnsupportedTransportType(String),
    #[error("transport.timeout must be > 0")]
    TransportTimeoutNotPositive,
    #[error("retry.base-delay must be > 0")]
    RetryBaseDelayNotPositive,
    #[error("retry.max-delay must be > 0")]
    RetryMaxDelayNotPositive,
    #[error("retry.base-delay must be <= retry.max-delay")]
    RetryBaseExceedsMax,
    #[error("tls enabled but cert paths are not fully set")]
    TlsIncomplete,
    #[error("sink.log-path must not be empty")]
    SinkLogPathEmpty,
    #[error("sink.queue-size must be > 0")]
    SinkQueueSizeNotPositive,
    #[error("sink.shutdown-timeout must be > 0")]
    SinkShutdownTimeoutNotPositive,
    #[error("batch.max-count must be > 0")]
    BatchMaxCountNotPositive,
    #[error("batch.max-bytes must be > 0")]
    BatchMaxBytesNotPositive,
    #[error("batch.flush-interval must be > 0")]
    BatchFlushIntervalNotPositive,
    #[error("{0}.burst requires {0}.per-second > 0")]
    RateLimitBurstWithoutRate(&'static str),
    #[error("transport.sink-address must not be empty")]
    SinkAddressEmpty,
}

/// Errors surfaced by a [`crate::node::sender::Sender`].
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("sender queue full")]
    QueueFull,
    #[error("sender is permanently closed")]
    SenderPermanentlyClosed,
    #[error("request cancelled")]
    Cancelled,
    #[error("transient transport error: {0}")]
    Transient(String),
}

impl TransportError {
    /// Whether the dispatcher should retry on this error: anything other
    /// than permanent closure is retried (queue-full included).
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::SenderPermanentlyClosed)
    }
}

/// Errors from the sink-side ingestion chain.
#[derive(Debug, Error, Clone)]
pub enum IngestError {
    #[error("ingest cancelled")]
    Cancelled,
    #[error("rate limit rejected item: requested tokens exceed burst capacity")]
    ExceedsBurstCapacity,
}

/// Errors from the write-ahead log.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("log is closed")]
    LogClosed,
    #[error("batch too large: payload exceeds u32::MAX bytes")]
    BatchTooLarge,
    #[error("corrupt log: CRC mismatch")]
    CorruptLog,
    #[error("partial batch detected")]
    PartialBatch,
    #[error("reading decode error: {0}")]
    Decode(#[from] crate::wire::DecodeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A suggested retry-after delay, attached to rate-limiting responses at
/// the wire boundary.
#[derive(Debug, Error, Clone)]
#[error("rate limited, retry after {retry_after:?}")]
pub struct RateLimitedError {
    pub retry_after: Option<Duration>,
}
