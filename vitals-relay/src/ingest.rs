//! Producer connection acceptor and per-connection frame pipeline

use anyhow::{Context, Result};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use vitals_core::{
    DiastolicFill, FrameDecoder, FrameError, FrameReader, RandomDiastolic, VitalState,
    DEFAULT_FRAME_TIMEOUT,
};

/// Builds the diastolic fill for each new producer pipeline
pub type FillFactory = Arc<dyn Fn() -> Box<dyn DiastolicFill> + Send + Sync>;

/// Producer-side settings
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub bind_addr: SocketAddr,
    pub frame_timeout: Duration,
    pub max_producers: usize,
    pub diastolic_min: f32,
    pub diastolic_max: f32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            max_producers: 64,
            diastolic_min: RandomDiastolic::DEFAULT_MIN,
            diastolic_max: RandomDiastolic::DEFAULT_MAX,
        }
    }
}

/// Counters shared by every producer pipeline
#[derive(Debug, Default)]
pub struct IngestStats {
    frames_decoded: AtomicU64,
    frames_rejected: AtomicU64,
    producers_active: AtomicU64,
    producers_total: AtomicU64,
    producers_refused: AtomicU64,
    timeouts: AtomicU64,
    disconnects: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub frames_decoded: u64,
    pub frames_rejected: u64,
    pub producers_active: u64,
    pub producers_total: u64,
    pub producers_refused: u64,
    pub timeouts: u64,
    pub disconnects: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            producers_active: self.producers_active.load(Ordering::Relaxed),
            producers_total: self.producers_total.load(Ordering::Relaxed),
            producers_refused: self.producers_refused.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }

    fn record_close(&self, reason: &FrameError) {
        match reason {
            FrameError::Timeout(_) => self.timeouts.fetch_add(1, Ordering::Relaxed),
            FrameError::Disconnected { .. } => self.disconnects.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
    }
}

/// Read, decode and publish frames until the connection fails.
///
/// Frames are handled strictly in arrival order. A frame that fails to
/// decode is skipped; the connection ends only on a transport failure,
/// which is returned.
pub async fn run_producer<R>(
    conn: R,
    peer: impl Display,
    frame_timeout: Duration,
    mut decoder: FrameDecoder,
    state: &VitalState,
    stats: &IngestStats,
) -> FrameError
where
    R: AsyncRead + Unpin,
{
    let mut reader = FrameReader::new(conn, frame_timeout);

    loop {
        let frame = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Producer {}: pipeline ending after {} frames", peer, reader.frames_read());
                stats.record_close(&e);
                return e;
            }
        };

        match decoder.decode(&frame) {
            Ok(reading) => {
                debug!(
                    "Producer {}: temperature {:.2}, systolic {:.1}, diastolic {:.1}{}, heart rate {:.1}",
                    peer,
                    reading.temperature,
                    reading.systolic_pressure,
                    reading.diastolic_pressure,
                    if decoder.diastolic_is_synthetic() { " (synthetic)" } else { "" },
                    reading.heart_rate
                );
                state.publish(reading);
                stats.frames_decoded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("Producer {}: skipping frame: {}", peer, e);
                stats.frames_rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Accepts producer connections and runs one pipeline per connection
pub struct ProducerAcceptor {
    listener: TcpListener,
    config: IngestConfig,
    state: VitalState,
    stats: Arc<IngestStats>,
    fill: FillFactory,
}

impl ProducerAcceptor {
    /// Bind the producer endpoint
    pub async fn bind(config: IngestConfig, state: VitalState) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind producer endpoint {}", config.bind_addr))?;

        info!("Producer endpoint listening on {}", listener.local_addr()?);

        let (min, max) = (config.diastolic_min, config.diastolic_max);
        let fill: FillFactory = Arc::new(move || Box::new(RandomDiastolic::new(min, max)));

        Ok(Self {
            listener,
            config,
            state,
            stats: Arc::new(IngestStats::default()),
            fill,
        })
    }

    /// Replace the diastolic fill used by new pipelines
    pub fn with_diastolic_fill(mut self, fill: FillFactory) -> Self {
        self.fill = fill;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("Failed to read producer endpoint address")
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Serve producers until the future is dropped.
    ///
    /// Dropping it aborts every running pipeline, closing their connections.
    pub async fn run(self) {
        let permits = Arc::new(Semaphore::new(self.config.max_producers));
        let mut pipelines = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Failed to accept producer: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&permits).try_acquire_owned() else {
                        warn!(
                            "Refusing producer {}: {} connections already active",
                            peer, self.config.max_producers
                        );
                        self.stats.producers_refused.fetch_add(1, Ordering::Relaxed);
                        drop(stream);
                        continue;
                    };

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Producer {}: could not set TCP_NODELAY: {}", peer, e);
                    }

                    let state = self.state.clone();
                    let stats = Arc::clone(&self.stats);
                    let decoder = FrameDecoder::new((self.fill)());
                    let frame_timeout = self.config.frame_timeout;

                    stats.producers_total.fetch_add(1, Ordering::Relaxed);
                    stats.producers_active.fetch_add(1, Ordering::Relaxed);
                    info!("Producer connected: {}", peer);

                    pipelines.spawn(async move {
                        let reason = run_producer(stream, peer, frame_timeout, decoder, &state, &stats).await;
                        stats.producers_active.fetch_sub(1, Ordering::Relaxed);
                        drop(permit);

                        match reason {
                            FrameError::Timeout(wait) => {
                                info!("Producer {} closed: no data within {:?}", peer, wait)
                            }
                            FrameError::Disconnected { received } => {
                                info!("Producer {} disconnected ({} bytes of a partial frame)", peer, received)
                            }
                            other => warn!("Producer {} closed: {}", peer, other),
                        }
                    });
                }
                Some(joined) = pipelines.join_next(), if !pipelines.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Producer pipeline panicked: {}", e);
                        }
                    }
                }
            }
        }
    }
}
