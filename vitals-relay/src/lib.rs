//! Vitals relay daemon library
//!
//! This module re-exports the daemon's modules for integration testing.

pub mod config;
pub mod ingest;
pub mod relay;

pub use config::{ConfigError, RelayConfig};
pub use ingest::{FillFactory, IngestConfig, IngestSnapshot, ProducerAcceptor};
pub use relay::Relay;
