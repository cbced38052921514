//! Generates one [`Reading`] per tick at a configured rate and enqueues it
//! onto the dispatcher's bounded channel, dropping (and counting) on a
//! full queue rather than blocking.
//!
//! Grounded on `original_source/internal/application/node/producer.go`,
//! ported from a `time.Ticker` loop onto `tokio::time::interval`.

use super::counters::Counters;
use crate::domain::Reading;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

pub struct Producer {
    sensor: String,
    rate_per_second: i64,
    out: mpsc::Sender<Reading>,
    counters: Arc<Counters>,
}

impl Producer {
    pub fn new(
        sensor: impl Into<String>,
        rate_per_second: i64,
        out: mpsc::Sender<Reading>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            sensor: sensor.into(),
            rate_per_second,
            out,
            counters,
        }
    }

    /// Runs until `shutdown` is cancelled. Exits early if a reading fails
    /// to construct (the sensor name is validated once upfront by the
    /// caller, so this only guards against unexpected runtime state).
    pub async fn run(self, shutdown: tokio_util::sync::CancellationToken) {
        if self.rate_per_second <= 0 {
            error!(rate = self.rate_per_second, "invalid rate_per_second");
            return;
        }

        let interval = Duration::from_secs(1) / self.rate_per_second as u32;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(sensor = %self.sensor, rate = self.rate_per_second, ?interval, "producer started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(
                        total_produced = self.counters.produced(),
                        total_dropped = self.counters.dropped(),
                        "producer stopped"
                    );
                    return;
                }
                _ = ticker.tick() => {
                    let value = rand::thread_rng().gen::<f64>();
                    let reading = match Reading::new(self.sensor.clone(), value, std::time::SystemTime::now()) {
                        Ok(r) => r,
                        Err(err) => {
                            error!(%err, "producer generated malformed data, exiting");
                            return;
                        }
                    };

                    match self.out.try_send(reading) {
                        Ok(()) => self.counters.inc_produced(),
                        Err(_) => self.counters.inc_dropped(),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn drops_readings_when_queue_is_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let counters = Arc::new(Counters::new());
        let producer = Producer::new("s1", 1000, tx, counters.clone());
        let token = tokio_util::sync::CancellationToken::new();

        let token2 = token.clone();
        let handle = tokio::spawn(producer.run(token2));

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        assert!(counters.produced() >= 1);
        // The channel was never drained, so once full, later ticks drop.
        drop(rx.try_recv());
        assert!(counters.produced() + counters.dropped() >= 1);
    }
}
