//! `telemetry-node`: emits sensor readings at a configured rate and
//! dispatches them to a Sink.
//!
//! Grounded on `original_source/cmd/node/main.go`.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use telemetry_pipeline::config::node::{NodeArgs, TransportTypeArg};
use telemetry_pipeline::config::tls::client_tls_config;
use telemetry_pipeline::node::dispatcher::{Dispatcher, DispatcherConfig};
use telemetry_pipeline::node::producer::Producer;
use telemetry_pipeline::node::sender::http::HttpSender;
use telemetry_pipeline::node::sender::streaming::{StreamingSender, StreamingSenderConfig};
use telemetry_pipeline::node::sender::Sender;
use telemetry_pipeline::node::Counters;
use telemetry_pipeline::Backoff;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = NodeArgs::parse();
    if let Err(err) = args.validate() {
        error!(%err, "invalid cli parameters");
        std::process::exit(1);
    }

    let counters = Arc::new(Counters::new());
    let shutdown = CancellationToken::new();

    let (tx, rx) = tokio::sync::mpsc::channel(args.queue_size);

    let producer = Producer::new(args.sensor.clone(), args.rate, tx, counters.clone());
    let producer_shutdown = shutdown.clone();
    let producer_handle = tokio::spawn(producer.run(producer_shutdown));

    let dispatcher_handle = match build_sender(&args).await {
        Ok(sender) => {
            let dispatcher = Dispatcher::new(
                rx,
                sender,
                DispatcherConfig {
                    max_retries: args.retry_max,
                    backoff: Backoff::new(args.retry_base_delay, args.retry_max_delay),
                },
                counters.clone(),
                shutdown.clone(),
            );
            Some(tokio::spawn(dispatcher.run()))
        }
        Err(err) => {
            error!(%err, "failed to create sender");
            None
        }
    };

    let dispatcher_handle = match dispatcher_handle {
        Some(h) => h,
        None => {
            shutdown.cancel();
            let _ = producer_handle.await;
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        _ = terminate() => {
            tracing::info!("shutdown signal received");
        }
    }
    shutdown.cancel();

    let _ = producer_handle.await;
    let _ = dispatcher_handle.await;
    tracing::info!("telemetry node shutdown complete");
}

#[cfg(unix)]
async fn terminate() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

enum AnySender {
    Http(HttpSender),
    Streaming(StreamingSender),
}

#[async_trait::async_trait]
impl Sender for AnySender {
    async fn send(
        &self,
        reading: &telemetry_pipeline::Reading,
    ) -> Result<(), telemetry_pipeline::error::TransportError> {
        match self {
            AnySender::Http(s) => s.send(reading).await,
            AnySender::Streaming(s) => s.send(reading).await,
        }
    }

    async fn close(&self) -> Result<(), telemetry_pipeline::error::TransportError> {
        match self {
            AnySender::Http(s) => s.close().await,
            AnySender::Streaming(s) => s.close().await,
        }
    }
}

async fn build_sender(args: &NodeArgs) -> Result<AnySender, String> {
    match args.transport_type {
        TransportTypeArg::Http => {
            let sender = HttpSender::new(format!("http://{}", args.sink_address), args.timeout)
                .map_err(|e| e.to_string())?;
            Ok(AnySender::Http(sender))
        }
        TransportTypeArg::Streaming => {
            let tls = client_tls_config(&args.tls).map_err(|e| e.to_string())?;
            let mut builder = reqwest::Client::builder().timeout(args.timeout);
            if let Some(tls_config) = tls {
                builder = builder.use_preconfigured_tls(Arc::try_unwrap(tls_config).unwrap_or_else(|arc| (*arc).clone()));
            }
            let client = builder.build().unwrap_or_default();
            let url = format!("http://{}/telemetry/stream", args.sink_address);
            let sender = StreamingSender::new(
                client,
                url,
                StreamingSenderConfig {
                    max_reconnect_attempts: args.retry_max,
                    backoff: Backoff::new(args.retry_base_delay, args.retry_max_delay),
                    close_on_server_disconnect: false,
                    buffer: args.queue_size,
                },
            );
            Ok(AnySender::Streaming(sender))
        }
    }
}
