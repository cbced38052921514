//! Telemetry Pipeline
//!
//! A Node/Sink telemetry pipeline: the Node emits sensor readings at a
//! fixed rate and ships them to a Sink over a reconnecting transport; the
//! Sink admits, rate-limits, batches, and durably appends readings to an
//! on-disk write-ahead log.
//!
//! This crate is the shared library backing the `telemetry-node` and
//! `telemetry-sink` binaries: domain types, the wire encoding, the
//! backoff calculator, and per-subsystem error types live here so both
//! binaries (and their tests) depend on one definition of each.

pub mod backoff;
pub mod config;
pub mod domain;
pub mod error;
pub mod node;
pub mod sink;
pub mod wal;
pub mod wire;

pub use backoff::Backoff;
pub use domain::{Reading, SensorName, Timestamp, Value};

