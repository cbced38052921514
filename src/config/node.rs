//! Node CLI surface and validated config, mirroring
//! `original_source/cmd/node/{config,flags}.go`.

use super::tls::TlsArgs;
use crate::error::ConfigError;
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "telemetry-node", about = "Emits telemetry readings to a sink")]
pub struct NodeArgs {
    /// Sensor name to send telemetry from.
    #[arg(long = "node-sensor", default_value = "default")]
    pub sensor: String,

    /// Telemetry messages per second.
    #[arg(long = "node-rate", default_value_t = 100)]
    pub rate: i64,

    /// Telemetry queue buffer size.
    #[arg(long = "node-queue-size", default_value_t = 100)]
    pub queue_size: usize,

    #[arg(long = "transport-type", value_enum, default_value_t = TransportTypeArg::Streaming)]
    pub transport_type: TransportTypeArg,

    /// Telemetry sink address.
    #[arg(long = "transport-sink-address", default_value = "localhost:9000")]
    pub sink_address: String,

    /// Transport request timeout.
    #[arg(long = "transport-timeout", value_parser = super::duration_arg, default_value = "5s")]
    pub timeout: Duration,

    #[command(flatten)]
    pub tls: TlsArgs,

    /// Maximum retry attempts per reading.
    #[arg(long = "retry-max", default_value_t = 5)]
    pub retry_max: u32,

    /// Initial retry backoff delay.
    #[arg(long = "retry-base-delay", value_parser = super::duration_arg, default_value = "200ms")]
    pub retry_base_delay: Duration,

    /// Maximum retry backoff delay.
    #[arg(long = "retry-max-delay", value_parser = super::duration_arg, default_value = "5s")]
    pub retry_max_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportTypeArg {
    Http,
    Streaming,
}

impl NodeArgs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate <= 0 {
            return Err(ConfigError::NodeRateNotPositive);
        }
        if self.queue_size == 0 {
            return Err(ConfigError::NodeQueueSizeNotPositive);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::TransportTimeoutNotPositive);
        }
        if self.retry_base_delay.is_zero() {
            return Err(ConfigError::RetryBaseDelayNotPositive);
        }
        if self.retry_max_delay.is_zero() {
            return Err(ConfigError::RetryMaxDelayNotPositive);
        }
        if self.retry_base_delay > self.retry_max_delay {
            return Err(ConfigError::RetryBaseExceedsMax);
        }
        if self.sink_address.is_empty() {
            return Err(ConfigError::SinkAddressEmpty);
        }
        self.tls.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> NodeArgs {
        NodeArgs::parse_from(["telemetry-node"])
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base_args().validate().is_ok());
    }

    #[test]
    fn rejects_zero_rate() {
        let mut args = base_args();
        args.rate = 0;
        assert!(matches!(
            args.validate(),
            Err(ConfigError::NodeRateNotPositive)
        ));
    }

    #[test]
    fn rejects_base_delay_exceeding_max() {
        let mut args = base_args();
        args.retry_base_delay = Duration::from_secs(10);
        args.retry_max_delay = Duration::from_secs(1);
        assert!(matches!(
            args.validate(),
            Err(ConfigError::RetryBaseExceedsMax)
        ));
    }
}
