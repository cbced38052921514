//! One-shot JSON-over-HTTP sender: one POST per reading, no persistent
//! connection state.
//!
//! Grounded on `original_source/internal/infrastructure/transport/http/{client,sender}.go`.

use super::Sender;
use crate::domain::Reading;
use crate::error::TransportError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::error;

#[derive(Serialize)]
struct TelemetryJson {
    sensor: String,
    value: f64,
    timestamp: i64,
}

pub struct HttpSender {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSender {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Transient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Sender for HttpSender {
    async fn send(&self, reading: &Reading) -> Result<(), TransportError> {
        let payload = TelemetryJson {
            sensor: reading.sensor.as_str().to_string(),
            value: reading.value.get(),
            timestamp: reading.timestamp.as_nanos() / 1_000_000,
        };

        let url = format!("{}/telemetry", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            error!(%status, "telemetry post rejected");
            return Err(TransportError::Transient(format!("http {status}")));
        }

        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Nothing to release: reqwest::Client owns a shared, idle-safe pool.
        Ok(())
    }
}
