use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use vitals_core::VitalState;

use crate::client::{BroadcastReport, Liveness, Payload, SubscriberId, SubscriberRegistry};
use crate::error::{BroadcasterError, Result};
use crate::message::VitalsMessage;

/// Broadcaster settings
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Subscriber endpoint
    pub bind_addr: SocketAddr,
    /// Tick period
    pub interval: Duration,
    /// Label attached to every message
    pub patient_label: String,
    pub max_subscribers: usize,
    /// Per-subscriber outbound queue depth
    pub queue_depth: usize,
    /// Longest a single socket write may take before the subscriber is dropped
    pub send_timeout: Duration,
    /// Longest a client may take to complete the WebSocket upgrade
    pub handshake_timeout: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 6789)),
            interval: Duration::from_secs(2),
            patient_label: "Patient 1".to_string(),
            max_subscribers: 64,
            queue_depth: 8,
            send_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Periodic push of the latest reading to WebSocket subscribers
pub struct VitalsBroadcaster {
    config: BroadcasterConfig,
    state: VitalState,
    registry: SubscriberRegistry,
    local_addr: RwLock<Option<SocketAddr>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: RwLock<bool>,
    ticks: Arc<AtomicU64>,
}

impl VitalsBroadcaster {
    /// Create new broadcaster reading from `state`
    pub fn new(config: BroadcasterConfig, state: VitalState) -> Self {
        let registry = SubscriberRegistry::new(config.max_subscribers);

        Self {
            config,
            state,
            registry,
            local_addr: RwLock::new(None),
            tasks: Mutex::new(Vec::new()),
            running: RwLock::new(false),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bind the subscriber endpoint and start the accept and tick loops.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut running = self.running.write().await;
        if *running {
            return Err(BroadcasterError::AlreadyRunning);
        }

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Vitals broadcaster listening on ws://{}", local_addr);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.registry.clone(),
            self.state.clone(),
            self.config.clone(),
        ));

        let tick_task = tokio::spawn(tick_loop(
            self.registry.clone(),
            self.state.clone(),
            self.config.clone(),
            Arc::clone(&self.ticks),
        ));

        self.tasks.lock().await.extend([accept_task, tick_task]);
        *self.local_addr.write().await = Some(local_addr);
        *running = true;

        Ok(local_addr)
    }

    /// Stop the broadcaster, closing every subscriber connection
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if !*running {
            return Err(BroadcasterError::NotStarted);
        }

        // Aborting the accept loop drops its session set, which aborts every writer
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        let dropped = self.registry.clear().await;

        *self.local_addr.write().await = None;
        *running = false;

        tracing::info!("Vitals broadcaster stopped ({} subscribers disconnected)", dropped);
        Ok(())
    }

    /// Broadcast the current snapshot once, outside the regular cadence
    pub async fn broadcast_now(&self) -> Result<BroadcastReport> {
        broadcast_snapshot(&self.registry, &self.state, &self.config.patient_label).await
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().await
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Get current subscriber count
    pub async fn subscriber_count(&self) -> usize {
        self.registry.len().await
    }

    /// Number of ticks fired since start
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }
}

impl Drop for VitalsBroadcaster {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

async fn broadcast_snapshot(
    registry: &SubscriberRegistry,
    state: &VitalState,
    patient_label: &str,
) -> Result<BroadcastReport> {
    let reading = state.snapshot();
    let message = VitalsMessage::from_reading(patient_label, &reading, Utc::now());
    let payload: Payload = Arc::from(message.to_json()?);
    Ok(registry.broadcast(&payload).await)
}

async fn tick_loop(
    registry: SubscriberRegistry,
    state: VitalState,
    config: BroadcasterConfig,
    ticks: Arc<AtomicU64>,
) {
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let stale_after = chrono::Duration::from_std(config.interval * 5).unwrap_or_else(|_| chrono::Duration::days(1));

    loop {
        interval.tick().await;
        let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;

        let age = state.snapshot().age(Utc::now());
        if age > stale_after {
            tracing::debug!("Tick {}: latest reading is {}s old", tick, age.num_seconds());
        }

        match broadcast_snapshot(&registry, &state, &config.patient_label).await {
            Ok(report) => tracing::debug!(
                "Tick {}: queued {}, dropped {}, removed {}",
                tick,
                report.queued,
                report.dropped,
                report.removed.len()
            ),
            Err(e) => tracing::error!("Failed to broadcast tick {}: {}", tick, e),
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: SubscriberRegistry,
    state: VitalState,
    config: BroadcasterConfig,
) {
    // Sessions hold a permit from accept on, so unfinished handshakes count too
    let permits = Arc::new(Semaphore::new(config.max_subscribers.max(1)));
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let Ok(permit) = Arc::clone(&permits).try_acquire_owned() else {
                        tracing::warn!(
                            "Refusing subscriber {}: {} sessions already open",
                            peer, config.max_subscribers
                        );
                        drop(stream);
                        continue;
                    };

                    tracing::debug!("Subscriber connection from {}", peer);
                    sessions.spawn(run_session(
                        stream,
                        peer,
                        permit,
                        registry.clone(),
                        state.clone(),
                        config.clone(),
                    ));
                }
                Err(e) => {
                    tracing::error!("Failed to accept subscriber: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!("Subscriber session panicked: {}", e);
                    }
                }
            }
        }
    }
}

/// Handshake, register and serve one subscriber until its connection ends
async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: OwnedSemaphorePermit,
    registry: SubscriberRegistry,
    state: VitalState,
    config: BroadcasterConfig,
) {
    let handshake = tokio_tungstenite::accept_async(stream);
    let mut ws = match tokio::time::timeout(config.handshake_timeout, handshake).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            tracing::warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
        Err(_) => {
            tracing::warn!(
                "WebSocket handshake with {} not completed within {:?}",
                peer, config.handshake_timeout
            );
            return;
        }
    };

    let (tx, rx) = mpsc::channel(config.queue_depth.max(1));

    // Catch-up: the current reading goes out before the first tick
    let message = VitalsMessage::from_reading(&config.patient_label, &state.snapshot(), Utc::now());
    match message.to_json() {
        Ok(json) => {
            let _ = tx.try_send(Arc::from(json));
        }
        Err(e) => tracing::warn!("Failed to serialize catch-up message: {}", e),
    }

    let (id, liveness) = match registry.add(peer, tx).await {
        Ok(registered) => registered,
        Err(e) => {
            tracing::warn!("Rejecting subscriber {}: {}", peer, e);
            let _ = ws.close(None).await;
            return;
        }
    };

    if let Err(e) = serve_subscriber(ws, rx, id, &liveness, config.send_timeout).await {
        tracing::info!("Subscriber {} closed: {}", id, e);
    }

    liveness.mark_closed();
    registry.remove(id).await;
}

async fn serve_subscriber(
    ws: tokio_tungstenite::WebSocketStream<TcpStream>,
    mut rx: mpsc::Receiver<Payload>,
    id: SubscriberId,
    liveness: &Liveness,
    send_timeout: Duration,
) -> Result<()> {
    let (mut sink, mut incoming) = ws.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(payload) = outbound else {
                    // Registry dropped us (stop or removal)
                    let _ = sink.close().await;
                    return Ok(());
                };
                match tokio::time::timeout(send_timeout, sink.send(Message::Text(payload.to_string()))).await {
                    Ok(sent) => sent?,
                    Err(_) => {
                        liveness.mark_closed();
                        return Err(BroadcasterError::Io(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            format!("send exceeded {:?}", send_timeout),
                        )));
                    }
                }
            }
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Subscriber {} disconnected", id);
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}
