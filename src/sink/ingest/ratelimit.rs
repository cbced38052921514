//! Token-bucket rate limiting in front of another ingestor: a conjunctive
//! set of rules (message rate, byte rate) must all admit an item before
//! it proceeds. Each rule waits for capacity rather than rejecting,
//! except when the item itself exceeds the bucket's burst capacity.
//!
//! Grounded on `original_source/internal/application/sink/ratelimit/{ingestor,rule}.go`,
//! which wraps `golang.org/x/time/rate.Limiter`; here built on `governor`.

use super::{Ingestor, TelemetryItem};
use crate::error::IngestError;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A single token-bucket rule consuming `n` tokens per item, where `n` is
/// either always 1 (message rate) or `item.size` (byte rate).
pub trait RateRule: Send + Sync {
    fn tokens_for(&self, item: &TelemetryItem) -> u32;
    fn limiter(&self) -> &DirectLimiter;
}

async fn wait_on(rule: &dyn RateRule, item: &TelemetryItem) -> Result<(), IngestError> {
    let n = rule.tokens_for(item).max(1);
    let n = NonZeroU32::new(n).unwrap_or(nonzero!(1u32));

    loop {
        match rule.limiter().check_n(n) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(not_until)) => {
                let wait = not_until.wait_time_from(governor::clock::DefaultClock::default().now());
                tokio::time::sleep(wait).await;
            }
            Err(_) => return Err(IngestError::ExceedsBurstCapacity),
        }
    }
}

pub struct MsgRateRule {
    limiter: DirectLimiter,
}

impl MsgRateRule {
    pub fn new(msgs_per_sec: u32, burst_msgs: u32) -> Self {
        let burst = NonZeroU32::new(burst_msgs.max(msgs_per_sec).max(1)).unwrap_or(nonzero!(1u32));
        let per_sec = NonZeroU32::new(msgs_per_sec.max(1)).unwrap_or(nonzero!(1u32));
        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_sec).allow_burst(burst)),
        }
    }
}

impl RateRule for MsgRateRule {
    fn tokens_for(&self, _item: &TelemetryItem) -> u32 {
        1
    }
    fn limiter(&self) -> &DirectLimiter {
        &self.limiter
    }
}

pub struct ByteRateRule {
    limiter: DirectLimiter,
}

impl ByteRateRule {
    pub fn new(bytes_per_sec: u32, burst_bytes: u32) -> Self {
        let burst = NonZeroU32::new(burst_bytes.max(bytes_per_sec).max(1)).unwrap_or(nonzero!(1u32));
        let per_sec = NonZeroU32::new(bytes_per_sec.max(1)).unwrap_or(nonzero!(1u32));
        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_sec).allow_burst(burst)),
        }
    }
}

impl RateRule for ByteRateRule {
    fn tokens_for(&self, item: &TelemetryItem) -> u32 {
        item.size as u32
    }
    fn limiter(&self) -> &DirectLimiter {
        &self.limiter
    }
}

/// The conjunction of rate rules a [`RateLimitedIngestor`] waits on.
pub struct IngestRatePolicy {
    rules: Vec<Box<dyn RateRule>>,
}

impl IngestRatePolicy {
    pub fn new(rules: Vec<Box<dyn RateRule>>) -> Self {
        Self { rules }
    }

    async fn wait(&self, item: &TelemetryItem) -> Result<(), IngestError> {
        for rule in &self.rules {
            wait_on(rule.as_ref(), item).await?;
        }
        Ok(())
    }
}

pub struct RateLimitedIngestor {
    next: Arc<dyn Ingestor>,
    policy: IngestRatePolicy,
}

impl RateLimitedIngestor {
    pub fn new(next: Arc<dyn Ingestor>, policy: IngestRatePolicy) -> Self {
        Self { next, policy }
    }
}

#[async_trait]
impl Ingestor for RateLimitedIngestor {
    async fn ingest(&self, item: TelemetryItem) -> Result<(), IngestError> {
        self.policy.wait(&item).await?;
        self.next.ingest(item).await
    }

    async fn close(&self) -> Result<(), IngestError> {
        self.next.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Reading;
    use std::time::SystemTime;
    use tokio::sync::mpsc;

    fn item(size: usize) -> TelemetryItem {
        TelemetryItem {
            reading: Reading::new("s1", 1.0, SystemTime::now()).unwrap(),
            size,
        }
    }

    #[tokio::test]
    async fn rejects_item_exceeding_burst_capacity() {
        let rule = ByteRateRule::new(100, 50);
        let result = wait_on(&rule, &item(1000)).await;
        assert!(matches!(result, Err(IngestError::ExceedsBurstCapacity)));
    }

    #[tokio::test]
    async fn admits_item_within_burst() {
        let rule = MsgRateRule::new(10, 10);
        assert!(wait_on(&rule, &item(1)).await.is_ok());
    }

    #[tokio::test]
    async fn forwards_to_next_ingestor_after_admission() {
        use crate::sink::ingest::ChannelIngestor;

        let (tx, mut rx) = mpsc::channel(4);
        let next: Arc<dyn Ingestor> = Arc::new(ChannelIngestor::new(tx));
        let policy = IngestRatePolicy::new(vec![Box::new(MsgRateRule::new(1000, 1000))]);
        let limited = RateLimitedIngestor::new(next, policy);

        limited.ingest(item(8)).await.unwrap();
        assert!(rx.recv().await.is_some());
    }
}
