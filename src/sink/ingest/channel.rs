//! Terminal ingestor: hands items to the batching worker's channel,
//! non-blocking, dropping (and logging) on a full channel rather than
//! applying backpressure to the caller.
//!
//! Grounded on `original_source/internal/application/sink/ingestor.go`'s
//! `ChannelIngestor`.

use super::{Ingestor, TelemetryItem};
use crate::error::IngestError;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

pub struct ChannelIngestor {
    out: Mutex<Option<mpsc::Sender<TelemetryItem>>>,
}

impl ChannelIngestor {
    pub fn new(out: mpsc::Sender<TelemetryItem>) -> Self {
        Self {
            out: Mutex::new(Some(out)),
        }
    }
}

#[async_trait]
impl Ingestor for ChannelIngestor {
    async fn ingest(&self, item: TelemetryItem) -> Result<(), IngestError> {
        let sender = self.out.lock().clone();
        match sender {
            Some(sender) => match sender.try_send(item) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(item)) => {
                    warn!(sensor = %item.reading.sensor, "dropping telemetry: channel full");
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(IngestError::Cancelled),
            },
            None => Err(IngestError::Cancelled),
        }
    }

    /// Drops the sender so the worker's `inbox.recv()` observes EOF.
    /// Idempotent: a second call finds `None` and is a no-op.
    async fn close(&self) -> Result<(), IngestError> {
        self.out.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Reading;
    use std::time::SystemTime;

    fn item(name: &str) -> TelemetryItem {
        TelemetryItem {
            reading: Reading::new(name, 1.0, SystemTime::now()).unwrap(),
            size: 16,
        }
    }

    #[tokio::test]
    async fn drops_silently_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let ingestor = ChannelIngestor::new(tx);

        assert!(ingestor.ingest(item("s1")).await.is_ok());
        assert!(ingestor.ingest(item("s2")).await.is_ok());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.reading.sensor.as_str(), "s1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reports_cancelled_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let ingestor = ChannelIngestor::new(tx);
        assert!(matches!(
            ingestor.ingest(item("s1")).await,
            Err(IngestError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn close_drops_sender_so_receiver_observes_eof() {
        let (tx, mut rx) = mpsc::channel(1);
        let ingestor = ChannelIngestor::new(tx);

        ingestor.close().await.unwrap();
        assert!(rx.recv().await.is_none());

        // Idempotent: closing again is a no-op, not a panic.
        ingestor.close().await.unwrap();
    }
}
