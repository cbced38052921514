//! Long-lived streaming sender: readings are pushed onto an internal
//! queue and forwarded to the Sink over a single reconnecting chunked-HTTP
//! upload, reconnecting with jittered backoff when the connection drops.
//!
//! State machine: `Connecting` (no body stream open) -> `Streaming`
//! (forwarding readings) -> `Flushing` (queue closed, draining in-flight
//! readings) -> `Closed` (forwarder task exited cleanly) or `Failed`
//! (reconnect budget exhausted).
//!
//! The wire-protocol framing a generated RPC stub would supply is
//! explicitly out of scope; readings are framed with the same
//! `u64 ts-ns | u8 name-len | name bytes | u64 value-bits` encoding the WAL
//! uses and streamed as the body of one long-lived POST.
//!
//! Grounded on `original_source/internal/infrastructure/transport/grpc/sender.go`'s
//! `run`/`openWithRetry`/`sendLoop` state machine.

use super::Sender;
use crate::backoff::Backoff;
use crate::domain::Reading;
use crate::error::TransportError;
use crate::wire;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connecting,
    Streaming,
    Flushing,
    Failed,
    Closed,
}

pub struct StreamingSenderConfig {
    pub max_reconnect_attempts: u32,
    pub backoff: Backoff,
    pub close_on_server_disconnect: bool,
    pub buffer: usize,
}

impl Default for StreamingSenderConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            backoff: Backoff::new(
                std::time::Duration::from_millis(100),
                std::time::Duration::from_secs(5),
            ),
            close_on_server_disconnect: false,
            buffer: 100,
        }
    }
}

pub struct StreamingSender {
    queue: Mutex<Option<mpsc::Sender<Reading>>>,
    closed: Arc<AtomicBool>,
    done: Arc<Notify>,
}

impl StreamingSender {
    pub fn new(client: reqwest::Client, url: impl Into<String>, cfg: StreamingSenderConfig) -> Self {
        let (tx, rx) = mpsc::channel(cfg.buffer);
        let closed = Arc::new(AtomicBool::new(false));
        let done = Arc::new(Notify::new());

        let url = url.into();
        let done_clone = done.clone();
        tokio::spawn(async move {
            run(client, url, rx, cfg).await;
            done_clone.notify_waiters();
        });

        Self {
            queue: Mutex::new(Some(tx)),
            closed,
            done,
        }
    }
}

#[async_trait]
impl Sender for StreamingSender {
    async fn send(&self, reading: &Reading) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SenderPermanentlyClosed);
        }

        let sender = self.queue.lock().clone();
        match sender {
            Some(sender) => match sender.try_send(reading.clone()) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => Err(TransportError::QueueFull),
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.closed.store(true, Ordering::SeqCst);
                    Err(TransportError::SenderPermanentlyClosed)
                }
            },
            None => Err(TransportError::SenderPermanentlyClosed),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Dropping the one real sender handle (not a clone of it) lets the
        // forwarder's `rx.recv()` observe EOF and drain into `Flushing`.
        let taken = self.queue.lock().take();
        drop(taken);
        self.done.notified().await;
        Ok(())
    }
}

/// The forwarder task: owns the reconnect loop and the one active chunked
/// upload at a time.
async fn run(
    client: reqwest::Client,
    url: String,
    mut rx: mpsc::Receiver<Reading>,
    cfg: StreamingSenderConfig,
) {
    let mut state = State::Connecting;
    let mut attempt: u32 = 1;

    loop {
        match state {
            State::Connecting => {
                match open_upload(&client, &url).await {
                    Ok(()) => {
                        attempt = 1;
                        state = State::Streaming;
                    }
                    Err(err) => {
                        if attempt > cfg.max_reconnect_attempts {
                            warn!(%err, "exhausted reconnect attempts, giving up");
                            state = State::Failed;
                            continue;
                        }
                        let delay = cfg.backoff.delay(attempt);
                        warn!(%err, attempt, ?delay, "failed to open streaming upload");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
            State::Streaming => match stream_loop(&client, &url, &mut rx).await {
                StreamOutcome::QueueClosed => state = State::Flushing,
                StreamOutcome::ConnectionLost => {
                    if cfg.close_on_server_disconnect {
                        warn!("connection lost, close_on_server_disconnect set, stopping");
                        state = State::Failed;
                    } else {
                        state = State::Connecting;
                    }
                }
            },
            State::Flushing => {
                info!("streaming sender flushed, closing");
                state = State::Closed;
            }
            State::Failed | State::Closed => return,
        }
    }
}

enum StreamOutcome {
    QueueClosed,
    ConnectionLost,
}

async fn open_upload(client: &reqwest::Client, url: &str) -> Result<(), TransportError> {
    // A liveness probe that the sink's streaming endpoint is reachable;
    // the actual body stream is opened fresh per `stream_loop` call since
    // reqwest's streaming body is consumed once per request.
    client
        .head(url)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| TransportError::Transient(e.to_string()))
}

/// Forward readings from `rx` as a single chunked POST body until the
/// queue closes or the connection fails.
async fn stream_loop(
    client: &reqwest::Client,
    url: &str,
    rx: &mut mpsc::Receiver<Reading>,
) -> StreamOutcome {
    let (body_tx, body_rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(32);

    let forward = async {
        while let Some(reading) = rx.recv().await {
            let mut buf = Vec::new();
            wire::encode_reading(&reading, &mut buf);
            if body_tx.send(Ok(Bytes::from(buf))).await.is_err() {
                return StreamOutcome::ConnectionLost;
            }
        }
        StreamOutcome::QueueClosed
    };

    let body_stream = tokio_stream::wrappers::ReceiverStream::new(body_rx);
    let request = client
        .post(url)
        .body(reqwest::Body::wrap_stream(body_stream))
        .send();

    tokio::select! {
        outcome = forward => outcome,
        result = request => match result {
            Ok(resp) if resp.status().is_success() => StreamOutcome::QueueClosed,
            _ => StreamOutcome::ConnectionLost,
        },
    }
}
