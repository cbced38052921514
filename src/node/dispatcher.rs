//! Drains the producer's queue and hands each reading to a [`Sender`],
//! retrying transient failures with jittered backoff up to a fixed number
//! of attempts, and triggering a one-shot pipeline-wide cancel when the
//! sender reports it is permanently closed.
//!
//! Three informal states: Running (normal drain loop), Draining (queue
//! closed, bounded best-effort flush), Stopped (sender released).
//!
//! Grounded on `original_source/internal/application/node/dispatcher.go`.

use super::counters::Counters;
use super::sender::Sender;
use crate::backoff::Backoff;
use crate::domain::Reading;
use crate::error::TransportError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DispatcherConfig {
    pub max_retries: u32,
    pub backoff: Backoff,
}

pub struct Dispatcher<S: Sender> {
    queue: mpsc::Receiver<Reading>,
    sender: S,
    max_retries: u32,
    backoff: Backoff,
    counters: Arc<Counters>,
    shutdown: tokio_util::sync::CancellationToken,
    cancel_once: AtomicBool,
}

impl<S: Sender> Dispatcher<S> {
    pub fn new(
        queue: mpsc::Receiver<Reading>,
        sender: S,
        cfg: DispatcherConfig,
        counters: Arc<Counters>,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> Self {
        Self {
            queue,
            sender,
            max_retries: cfg.max_retries,
            backoff: cfg.backoff,
            counters,
            shutdown,
            cancel_once: AtomicBool::new(false),
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.drain().await;
                    break;
                }
                item = self.queue.recv() => {
                    match item {
                        Some(reading) => self.dispatch(&reading).await,
                        None => {
                            info!("input channel closed");
                            break;
                        }
                    }
                }
            }
        }
        self.close().await;
    }

    async fn dispatch(&self, reading: &Reading) {
        for attempt in 1..=self.max_retries {
            match self.sender.send(reading).await {
                Ok(()) => {
                    self.counters.inc_sent();
                    return;
                }
                Err(err) => {
                    if matches!(err, TransportError::SenderPermanentlyClosed) {
                        self.cancel_once();
                        return;
                    }

                    if attempt == self.max_retries {
                        self.counters.inc_failed();
                        error!(sensor = %reading.sensor, attempt, %err, "failed to send reading");
                        return;
                    }

                    let delay = self.backoff.delay(attempt);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn cancel_once(&self) {
        if !self.cancel_once.swap(true, Ordering::SeqCst) {
            self.shutdown.cancel();
        }
    }

    /// Best-effort flush of whatever is left in the queue, bounded to
    /// [`DRAIN_TIMEOUT`] total; does not block on an empty queue.
    async fn drain(&mut self) {
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        loop {
            match tokio::time::timeout_at(deadline, self.queue.recv()).await {
                Ok(Some(reading)) => self.dispatch(&reading).await,
                Ok(None) => {
                    info!("all readings drained");
                    return;
                }
                Err(_) => {
                    warn!("drain deadline exceeded, stopping with readings unflushed");
                    return;
                }
            }
        }
    }

    async fn close(&self) {
        info!("dispatcher stopping");
        if let Err(err) = self.sender.close().await {
            warn!(%err, "sender close failed");
        }
        info!(
            total_sent = self.counters.sent(),
            total_failed = self.counters.failed(),
            "final dispatcher metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::SystemTime;

    struct FlakySender {
        fail_times: Mutex<u32>,
        sent: Arc<Mutex<Vec<Reading>>>,
    }

    #[async_trait]
    impl Sender for FlakySender {
        async fn send(&self, reading: &Reading) -> Result<(), TransportError> {
            let mut remaining = self.fail_times.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Transient("not yet".into()));
            }
            self.sent.lock().unwrap().push(reading.clone());
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let (tx, rx) = mpsc::channel(4);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sender = FlakySender {
            fail_times: Mutex::new(2),
            sent: sent.clone(),
        };
        let dispatcher = Dispatcher::new(
            rx,
            sender,
            DispatcherConfig {
                max_retries: 5,
                backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(10)),
            },
            Arc::new(Counters::new()),
            tokio_util::sync::CancellationToken::new(),
        );

        let handle = tokio::spawn(dispatcher.run());
        tx.send(Reading::new("s1", 1.0, SystemTime::now()).unwrap())
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    struct PermanentlyClosedSender;

    #[async_trait]
    impl Sender for PermanentlyClosedSender {
        async fn send(&self, _reading: &Reading) -> Result<(), TransportError> {
            Err(TransportError::SenderPermanentlyClosed)
        }
        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_closure_cancels_shutdown_token() {
        let (tx, rx) = mpsc::channel(4);
        let shutdown = tokio_util::sync::CancellationToken::new();
        let dispatcher = Dispatcher::new(
            rx,
            PermanentlyClosedSender,
            DispatcherConfig {
                max_retries: 3,
                backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(10)),
            },
            Arc::new(Counters::new()),
            shutdown.clone(),
        );

        let handle = tokio::spawn(dispatcher.run());
        tx.send(Reading::new("s1", 1.0, SystemTime::now()).unwrap())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(shutdown.is_cancelled());
        drop(tx);
        handle.await.unwrap();
    }
}
