//! Batches incoming readings and flushes them to the WAL when the batch
//! reaches a message-count or byte-size threshold, or when a flush
//! interval elapses — whichever comes first.
//!
//! Grounded on `original_source/internal/application/sink/worker.go`.

use super::ingest::TelemetryItem;
use crate::domain::Reading;
use crate::error::WalError;
use crate::wal::Wal;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub max_count: usize,
    pub max_bytes: usize,
    pub flush_interval: Duration,
}

pub struct Worker {
    inbox: mpsc::Receiver<TelemetryItem>,
    wal: Arc<Mutex<Wal>>,
    cfg: BatchConfig,
    started: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(inbox: mpsc::Receiver<TelemetryItem>, wal: Arc<Mutex<Wal>>, cfg: BatchConfig) -> Self {
        Self {
            inbox,
            wal,
            cfg,
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the worker loop. Only the first call takes effect, matching
    /// the original's "safe for a single `Start()` call" contract.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return tokio::spawn(async {});
        }
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut batch: Vec<Reading> = Vec::new();
        let mut batch_bytes: usize = 0;
        let mut timer = Box::pin(tokio::time::sleep(self.cfg.flush_interval));

        loop {
            tokio::select! {
                item = self.inbox.recv() => {
                    match item {
                        Some(item) => {
                            batch_bytes += item.size;
                            batch.push(item.reading);

                            if batch.len() >= self.cfg.max_count || batch_bytes >= self.cfg.max_bytes {
                                if self.flush(&mut batch, &mut batch_bytes).await.is_err() {
                                    return;
                                }
                                timer.set(tokio::time::sleep(self.cfg.flush_interval));
                            }
                        }
                        None => {
                            let _ = self.flush(&mut batch, &mut batch_bytes).await;
                            return;
                        }
                    }
                }
                _ = &mut timer => {
                    if self.flush(&mut batch, &mut batch_bytes).await.is_err() {
                        return;
                    }
                    timer.set(tokio::time::sleep(self.cfg.flush_interval));
                }
            }
        }
    }

    /// Appends the current batch to the WAL, only clearing it (and the
    /// running byte count) once the append has actually succeeded. A WAL
    /// write failure is fatal (spec: "Worker terminates, causing sink
    /// shutdown"), so the error is returned rather than merely logged,
    /// and the batch is left intact for the caller to stop on.
    async fn flush(&self, batch: &mut Vec<Reading>, batch_bytes: &mut usize) -> Result<(), WalError> {
        if batch.is_empty() {
            return Ok(());
        }

        info!(len = batch.len(), "flushing telemetry batch");

        let wal = self.wal.clone();
        let to_write = batch.clone();

        // Append is blocking (file write + fsync); offload it so it never
        // shares a runtime thread with network tasks without isolation.
        let result = tokio::task::spawn_blocking(move || wal.lock().append(&to_write))
            .await
            .expect("wal append task panicked");

        match result {
            Ok(()) => {
                batch.clear();
                *batch_bytes = 0;
                Ok(())
            }
            Err(err) => {
                error!(%err, "failed to flush telemetry batch, terminating worker");
                Err(err)
            }
        }
    }
}
