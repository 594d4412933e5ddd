//! Relay wiring: producer acceptor, shared state and broadcaster

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use vitals_broadcaster::VitalsBroadcaster;
use vitals_core::VitalState;

use crate::config::RelayConfig;
use crate::ingest::{FillFactory, IngestSnapshot, IngestStats, ProducerAcceptor};

/// A running relay.
///
/// The producer domain (one task per device connection) and the broadcast
/// domain (tick loop plus one writer per subscriber) share nothing but the
/// [`VitalState`] handle.
pub struct Relay {
    state: VitalState,
    broadcaster: VitalsBroadcaster,
    ingest_task: JoinHandle<()>,
    stats: Arc<IngestStats>,
    producer_addr: SocketAddr,
    subscriber_addr: SocketAddr,
}

impl Relay {
    /// Bind both endpoints and start serving
    pub async fn start(config: RelayConfig) -> Result<Self> {
        Self::start_with_fill(config, None).await
    }

    /// Start with a custom diastolic fill for every producer pipeline
    pub async fn start_with_fill(config: RelayConfig, fill: Option<FillFactory>) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let state = VitalState::default();

        let mut acceptor = ProducerAcceptor::bind(config.ingest(), state.clone()).await?;
        if let Some(fill) = fill {
            acceptor = acceptor.with_diastolic_fill(fill);
        }
        let producer_addr = acceptor.local_addr()?;
        let stats = acceptor.stats();

        let broadcaster = VitalsBroadcaster::new(config.broadcaster(), state.clone());
        let subscriber_addr = broadcaster
            .start()
            .await
            .with_context(|| format!("Failed to bind subscriber endpoint {}", config.subscriber_addr))?;

        let ingest_task = tokio::spawn(acceptor.run());

        info!(
            "Relay running: producers on {}, subscribers on ws://{}, tick every {:?}",
            producer_addr,
            subscriber_addr,
            config.broadcast_interval()
        );

        Ok(Self {
            state,
            broadcaster,
            ingest_task,
            stats,
            producer_addr,
            subscriber_addr,
        })
    }

    pub fn producer_addr(&self) -> SocketAddr {
        self.producer_addr
    }

    pub fn subscriber_addr(&self) -> SocketAddr {
        self.subscriber_addr
    }

    /// Handle to the latest reading
    pub fn state(&self) -> &VitalState {
        &self.state
    }

    pub fn stats(&self) -> IngestSnapshot {
        self.stats.snapshot()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count().await
    }

    pub fn tick_count(&self) -> u64 {
        self.broadcaster.tick_count()
    }

    /// Close every producer and subscriber connection and stop both listeners
    pub async fn shutdown(mut self) -> Result<()> {
        self.ingest_task.abort();
        // Cancellation is the expected outcome
        let _ = (&mut self.ingest_task).await;

        self.broadcaster.stop().await.context("Failed to stop broadcaster")?;

        let stats = self.stats.snapshot();
        info!(
            "Relay stopped: {} frames decoded, {} rejected, {} producers served",
            stats.frames_decoded, stats.frames_rejected, stats.producers_total
        );
        Ok(())
    }
}

/// Dropping without [`Relay::shutdown`] still stops both endpoints
impl Drop for Relay {
    fn drop(&mut self) {
        self.ingest_task.abort();
    }
}
