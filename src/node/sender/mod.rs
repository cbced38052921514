//! Transport abstraction the dispatcher sends through, with two concrete
//! implementations: a one-shot HTTP sender and a long-lived streaming
//! sender. Grounded on `original_source/internal/application/node`'s
//! `TelemetrySender` interface, implemented by both
//! `transporthttp.TelemetryHttpSender` and `transportgrpc.TelemetryGrpcSender`.

pub mod http;
pub mod streaming;

use crate::domain::Reading;
use crate::error::TransportError;
use async_trait::async_trait;

#[async_trait]
pub trait Sender: Send + Sync + 'static {
    async fn send(&self, reading: &Reading) -> Result<(), TransportError>;
    async fn close(&self) -> Result<(), TransportError>;
}
