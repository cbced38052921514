//! Accept loop for the Sink: one route for a single JSON reading (the
//! one-shot HTTP transport's counterpart), one route accepting a chunked
//! stream of wire-encoded readings (the streaming transport's
//! counterpart), both handed off to the configured [`Ingestor`].
//!
//! Grounded on `original_source/internal/infrastructure/transport/grpc/server.go`'s
//! `StreamTelemetry` handler and `http/sender.go`'s `telemetryJSON` shape,
//! reexpressed over `axum` since the concrete RPC framing is out of scope.

use crate::domain::Reading;
use crate::sink::ingest::{Ingestor, TelemetryItem};
use crate::wire;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};

#[derive(Clone)]
struct AppState {
    ingestor: Arc<dyn Ingestor>,
}

#[derive(Deserialize)]
struct TelemetryJson {
    sensor: String,
    value: f64,
    timestamp: i64,
}

pub fn router(ingestor: Arc<dyn Ingestor>) -> Router {
    let state = AppState { ingestor };
    Router::new()
        .route("/telemetry", post(ingest_json))
        .route("/telemetry/stream", post(ingest_stream))
        .with_state(state)
}

async fn ingest_json(
    State(state): State<AppState>,
    Json(payload): Json<TelemetryJson>,
) -> StatusCode {
    let reading = match Reading::new(
        payload.sensor,
        payload.value,
        SystemTime::UNIX_EPOCH + Duration::from_millis(payload.timestamp.max(0) as u64),
    ) {
        Ok(r) => r,
        Err(err) => {
            warn!(%err, "received malformed telemetry");
            return StatusCode::BAD_REQUEST;
        }
    };

    let size = wire::encoded_len(std::slice::from_ref(&reading));
    match state.ingestor.ingest(TelemetryItem { reading, size }).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(err) => {
            error!(%err, "ingest rejected");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Decode a chunked body of back-to-back wire-encoded readings, ingesting
/// each as it completes (the HTTP counterpart of the gRPC server's
/// `Recv`-in-a-loop handler).
async fn ingest_stream(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let readings = match wire::decode_readings(&body) {
        Ok(r) => r,
        Err(err) => {
            warn!(%err, "received malformed telemetry stream chunk");
            return StatusCode::BAD_REQUEST;
        }
    };

    let mut received = 0u64;
    for reading in readings {
        let size = wire::encoded_len(std::slice::from_ref(&reading));
        if let Err(err) = state.ingestor.ingest(TelemetryItem { reading, size }).await {
            error!(%err, "ingest rejected mid-stream");
            return StatusCode::SERVICE_UNAVAILABLE;
        }
        received += 1;
    }

    info!(received, "stream chunk ingested");
    StatusCode::ACCEPTED
}

/// Serve `router` on `addr` until `shutdown` is cancelled, then wait up to
/// `shutdown_timeout` for in-flight connections to finish.
pub async fn serve(
    addr: SocketAddr,
    router: Router,
    shutdown: tokio_util::sync::CancellationToken,
    shutdown_timeout: Duration,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "sink listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown.cancelled().await;
        info!("shutdown signal received, draining connections");
    });

    match tokio::time::timeout(shutdown_timeout, server).await {
        Ok(result) => result,
        Err(_) => {
            warn!("graceful shutdown timed out; connections were forced closed");
            Ok(())
        }
    }
}

/// TLS-terminating counterpart of [`serve`], used when `--tls-enabled` is
/// set: requires and verifies client certificates (mTLS), matching
/// `original_source/.../tlsconfig::ServerTLSConfig`.
pub async fn serve_tls(
    addr: SocketAddr,
    router: Router,
    tls_config: Arc<rustls::ServerConfig>,
    shutdown: tokio_util::sync::CancellationToken,
    shutdown_timeout: Duration,
) -> std::io::Result<()> {
    let rustls_config = axum_server::tls_rustls::RustlsConfig::from_config(tls_config);
    let handle = axum_server::Handle::new();

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        shutdown_handle.graceful_shutdown(Some(shutdown_timeout));
    });

    info!(%addr, "sink listening (tls)");
    axum_server::bind_rustls(addr, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct RecordingIngestor {
        items: Mutex<Vec<TelemetryItem>>,
    }

    #[async_trait]
    impl Ingestor for RecordingIngestor {
        async fn ingest(&self, item: TelemetryItem) -> Result<(), IngestError> {
            self.items.lock().unwrap().push(item);
            Ok(())
        }
        async fn close(&self) -> Result<(), IngestError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn json_route_accepts_well_formed_reading() {
        let ingestor = Arc::new(RecordingIngestor {
            items: Mutex::new(Vec::new()),
        });
        let app = router(ingestor.clone());

        let body = serde_json::json!({"sensor": "s1", "value": 1.5, "timestamp": 1000});
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/telemetry")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(ingestor.items.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn json_route_rejects_malformed_sensor() {
        let ingestor = Arc::new(RecordingIngestor {
            items: Mutex::new(Vec::new()),
        });
        let app = router(ingestor);

        let body = serde_json::json!({"sensor": "", "value": 1.5, "timestamp": 1000});
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/telemetry")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
