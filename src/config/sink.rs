//! Sink CLI surface and validated config, mirroring
//! `original_source/cmd/sink/config/{model,parse,validate}.go`.

use super::tls::TlsArgs;
use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "telemetry-sink", about = "Ingests, rate-limits, and durably logs telemetry")]
pub struct SinkArgs {
    /// Path to the telemetry WAL file.
    #[arg(long = "sink-log-path", default_value = "./telemetry.wal")]
    pub log_path: PathBuf,

    /// Telemetry channel buffer size.
    #[arg(long = "sink-queue-size", default_value_t = 1000)]
    pub queue_size: usize,

    /// Server shutdown timeout.
    #[arg(long = "sink-shutdown-timeout", value_parser = super::duration_arg, default_value = "5s")]
    pub shutdown_timeout: Duration,

    /// Max telemetry messages per batch.
    #[arg(long = "batch-max-count", default_value_t = 100)]
    pub batch_max_count: usize,

    /// Max batch size in bytes.
    #[arg(long = "batch-max-bytes", default_value_t = 64 * 1024)]
    pub batch_max_bytes: usize,

    /// Max time before a batch is flushed.
    #[arg(long = "batch-flush-interval", value_parser = super::duration_arg, default_value = "1s")]
    pub batch_flush_interval: Duration,

    /// Max messages per second (0 = unlimited).
    #[arg(long = "ratelimit-msgs-per-sec", default_value_t = 0)]
    pub ratelimit_msgs_per_sec: u32,

    /// Burst size for the message rate limiter.
    #[arg(long = "ratelimit-msgs-burst", default_value_t = 0)]
    pub ratelimit_msgs_burst: u32,

    /// Bytes per second rate limit (0 = unlimited).
    #[arg(long = "ratelimit-bytes-per-sec", default_value_t = 0)]
    pub ratelimit_bytes_per_sec: u32,

    /// Burst size for the byte rate limiter.
    #[arg(long = "ratelimit-bytes-burst", default_value_t = 0)]
    pub ratelimit_bytes_burst: u32,

    /// Address to listen on.
    #[arg(long = "transport-sink-address", default_value = ":9000")]
    pub sink_address: String,

    #[command(flatten)]
    pub tls: TlsArgs,
}

impl SinkArgs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_path.as_os_str().is_empty() {
            return Err(ConfigError::SinkLogPathEmpty);
        }
        if self.queue_size == 0 {
            return Err(ConfigError::SinkQueueSizeNotPositive);
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::SinkShutdownTimeoutNotPositive);
        }
        if self.batch_max_count == 0 {
            return Err(ConfigError::BatchMaxCountNotPositive);
        }
        if self.batch_max_bytes == 0 {
            return Err(ConfigError::BatchMaxBytesNotPositive);
        }
        if self.batch_flush_interval.is_zero() {
            return Err(ConfigError::BatchFlushIntervalNotPositive);
        }

        if self.ratelimit_msgs_per_sec == 0 && self.ratelimit_msgs_burst > 0 {
            return Err(ConfigError::RateLimitBurstWithoutRate("ratelimit.messages"));
        }
        if self.ratelimit_bytes_per_sec == 0 && self.ratelimit_bytes_burst > 0 {
            return Err(ConfigError::RateLimitBurstWithoutRate("ratelimit.bytes"));
        }

        if self.sink_address.is_empty() {
            return Err(ConfigError::SinkAddressEmpty);
        }

        self.tls.validate()?;
        Ok(())
    }
}
