//! `telemetry-sink`: ingests, optionally rate-limits, batches, and
//! durably logs telemetry readings.
//!
//! Grounded on `original_source/cmd/sink/main.go`.

use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use telemetry_pipeline::config::sink::SinkArgs;
use telemetry_pipeline::config::tls::server_tls_config;
use telemetry_pipeline::sink::ingest::ratelimit::{ByteRateRule, IngestRatePolicy, MsgRateRule, RateRule};
use telemetry_pipeline::sink::ingest::{ChannelIngestor, Ingestor, RateLimitedIngestor};
use telemetry_pipeline::sink::server::{router, serve, serve_tls};
use telemetry_pipeline::sink::worker::{BatchConfig, Worker};
use telemetry_pipeline::wal::Wal;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = SinkArgs::parse();
    if let Err(err) = args.validate() {
        error!(%err, "invalid cli parameters");
        std::process::exit(1);
    }

    let shutdown = CancellationToken::new();

    let wal = match Wal::open(&args.log_path) {
        Ok(wal) => Arc::new(Mutex::new(wal)),
        Err(err) => {
            error!(%err, "failed to open telemetry log");
            std::process::exit(1);
        }
    };

    let (tx, rx) = tokio::sync::mpsc::channel(args.queue_size);
    let base_ingestor: Arc<dyn Ingestor> = Arc::new(ChannelIngestor::new(tx));

    let mut rules: Vec<Box<dyn RateRule>> = Vec::new();
    if args.ratelimit_msgs_per_sec > 0 {
        rules.push(Box::new(MsgRateRule::new(
            args.ratelimit_msgs_per_sec,
            args.ratelimit_msgs_burst,
        )));
    }
    if args.ratelimit_bytes_per_sec > 0 {
        rules.push(Box::new(ByteRateRule::new(
            args.ratelimit_bytes_per_sec,
            args.ratelimit_bytes_burst,
        )));
    }

    let ingestor: Arc<dyn Ingestor> = if rules.is_empty() {
        base_ingestor
    } else {
        Arc::new(RateLimitedIngestor::new(
            base_ingestor,
            IngestRatePolicy::new(rules),
        ))
    };

    let worker = Worker::new(
        rx,
        wal.clone(),
        BatchConfig {
            max_count: args.batch_max_count,
            max_bytes: args.batch_max_bytes,
            flush_interval: args.batch_flush_interval,
        },
    );
    let worker_handle = worker.start();

    let addr: std::net::SocketAddr = args
        .sink_address
        .parse()
        .or_else(|_| format!("0.0.0.0{}", args.sink_address).parse())
        .unwrap_or_else(|_| "0.0.0.0:9000".parse().unwrap());

    let app = router(ingestor.clone());

    let server_shutdown = shutdown.clone();
    let server_handle = match server_tls_config(&args.tls) {
        Ok(Some(tls_config)) => tokio::spawn(serve_tls(
            addr,
            app,
            tls_config,
            server_shutdown,
            args.shutdown_timeout,
        )),
        Ok(None) => tokio::spawn(serve(addr, app, server_shutdown, args.shutdown_timeout)),
        Err(err) => {
            error!(%err, "failed to set up tls");
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

    if let Err(err) = server_handle.await.unwrap_or(Ok(())) {
        error!(%err, "server failed during shutdown");
    }

    if let Err(err) = ingestor.close().await {
        error!(%err, "ingestor close failed");
    }
    let _ = worker_handle.await;

    tracing::info!("sink shutdown complete");
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
