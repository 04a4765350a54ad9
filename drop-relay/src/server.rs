//! Main DropRelay coordination.
//!
//! DropRelay owns the session registry and routes every inbound message:
//! codec → state machine (under the record lock) → peer queues. It also
//! handles transport closure, the periodic sweep and telemetry dispatch.

use crate::config::Config;
use crate::connection::{ConnectionId, Outgoing, PeerHandle};
use crate::error::ProtocolError;
use crate::limits::RateLimits;
use crate::machine::{self, Target, TelemetryEvent, Transition};
use crate::registry::{SessionRecord, SessionRegistry, SessionState};
use crate::telemetry::TelemetrySink;
use drop_types::{parse_text, DataFrame, Inbound, Reply, Role, SessionToken};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Operational metrics for monitoring relay activity.
///
/// Counters are monotonically increasing (reset only on restart).
/// `connections_open` is a gauge.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total WebSocket connections accepted.
    pub connections_total: AtomicU64,
    /// Connections currently open.
    pub connections_open: AtomicU64,
    /// Total sessions created.
    pub sessions_created: AtomicU64,
    /// Total data frames forwarded to a Receiver.
    pub frames_relayed: AtomicU64,
    /// Total data frame bytes forwarded.
    pub bytes_relayed: AtomicU64,
    /// Total messages answered with `ERROR`.
    pub protocol_errors: AtomicU64,
    /// Total role bindings cleared by transport closure.
    pub disconnects: AtomicU64,
    /// Total sessions deleted by the sweep.
    pub sessions_swept: AtomicU64,
    /// Total telemetry writes that failed.
    pub telemetry_failures: AtomicU64,
    /// Total rate limit rejections.
    pub rate_limit_hits: AtomicU64,
}

impl RelayMetrics {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Result of one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Role bindings cleared because their transport had closed.
    pub released: usize,
    /// Sessions cancelled for inactivity.
    pub expired: usize,
    /// Sessions deleted.
    pub deleted: usize,
}

/// Public view of a session, for `GET /sessions/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// Session token.
    pub id: SessionToken,
    /// Announced file name.
    pub name: Option<String>,
    /// Announced file size.
    pub size: Option<u64>,
    /// Whether a Sender is bound.
    pub sender_connected: bool,
    /// Whether a Receiver is bound.
    pub receiver_connected: bool,
    /// Whether the Receiver has sent `ready`.
    pub receiver_ready: bool,
    /// Lifecycle stage.
    pub state: SessionState,
}

/// What a dispatched transition did, gathered under the record lock.
#[derive(Debug, Default)]
struct Dispatched {
    events: Vec<TelemetryEvent>,
    rejected: bool,
    relayed_bytes: Option<usize>,
}

/// Text of the `ERROR` sent to the survivor when `lost` disconnects.
pub fn disconnect_notice(lost: Role) -> &'static str {
    match lost {
        Role::Sender => "the sender ended the connection; the transfer is stalled until it reconnects",
        Role::Receiver => "the receiver ended the connection",
    }
}

/// Main relay server.
pub struct DropRelay {
    config: Config,
    registry: SessionRegistry,
    telemetry: Arc<dyn TelemetrySink>,
    /// Rate limiters for upgrades and session creation.
    rate_limits: RateLimits,
    /// Operational metrics (counters, gauges).
    metrics: Arc<RelayMetrics>,
    next_connection: AtomicU64,
    started_at: Instant,
}

impl std::fmt::Debug for DropRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropRelay")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .field("sessions_count", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl DropRelay {
    /// Create a new DropRelay with the given config and telemetry sink.
    pub fn new(config: Config, telemetry: Arc<dyn TelemetrySink>) -> Self {
        let rate_limits = RateLimits::new(&config.limits);
        Self {
            config,
            registry: SessionRegistry::new(),
            telemetry,
            rate_limits,
            metrics: Arc::new(RelayMetrics::default()),
            next_connection: AtomicU64::new(1),
            started_at: Instant::now(),
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Time since the relay was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Allocate a fresh session token and register it.
    pub fn create_session(&self) -> SessionToken {
        loop {
            let token = SessionToken::random();
            if self.create_session_with(token.clone()) {
                return token;
            }
        }
    }

    /// Register an externally issued token. Returns `false` if it exists.
    pub fn create_session_with(&self, token: SessionToken) -> bool {
        let created = self.registry.create(token.clone());
        if created {
            RelayMetrics::bump(&self.metrics.sessions_created);
            tracing::info!("{:?}: session created", token);
        }
        created
    }

    /// Public view of a session.
    pub async fn session_view(&self, token: &SessionToken) -> Option<SessionView> {
        self.registry
            .with_record(token, |record| SessionView {
                id: record.token().clone(),
                name: record.file().map(|f| f.name.clone()),
                size: record.file().map(|f| f.size),
                sender_connected: record.peer(Role::Sender).is_some(),
                receiver_connected: record.peer(Role::Receiver).is_some(),
                receiver_ready: record.receiver_ready(),
                state: record.state(),
            })
            .await
    }

    /// Register a new transport connection.
    ///
    /// The caller's writer task drains the returned queue.
    pub fn open_connection(&self, addr: SocketAddr) -> (PeerHandle, mpsc::UnboundedReceiver<Outgoing>) {
        let id = ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed));
        RelayMetrics::bump(&self.metrics.connections_total);
        RelayMetrics::bump(&self.metrics.connections_open);
        tracing::debug!("{} opened from {}", id, addr);
        PeerHandle::new(id, addr)
    }

    /// Handle a text message from `origin`.
    pub async fn handle_text(&self, origin: &PeerHandle, text: &str) {
        let inbound = match parse_text(text) {
            Ok(inbound) => inbound,
            Err(e) => return self.refuse(origin, e.into()),
        };

        let (token, dispatched) = match inbound {
            Inbound::Noise => {
                tracing::debug!("{}: keepalive before session, ignored", origin.id());
                return;
            }
            Inbound::Greeting { role, token } => {
                let dispatched = self
                    .registry
                    .with_record(&token, |record| {
                        let transition = machine::on_greeting(record, origin, role);
                        Self::dispatch(record, origin, transition)
                    })
                    .await;
                (token, dispatched)
            }
            Inbound::Control { token, command } => {
                tracing::debug!("{:?}: {} from {}", token, command.name(), origin.id());
                let dispatched = self
                    .registry
                    .with_record(&token, |record| {
                        let transition = machine::on_command(record, origin, command);
                        Self::dispatch(record, origin, transition)
                    })
                    .await;
                (token, dispatched)
            }
        };

        match dispatched {
            Some(dispatched) => self.settle(dispatched),
            None => self.refuse(origin, ProtocolError::UnknownSession(token.to_string())),
        }
    }

    /// Handle a binary data frame from `origin`.
    pub async fn handle_binary(&self, origin: &PeerHandle, raw: Vec<u8>) {
        let frame = match DataFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => return self.refuse(origin, e.into()),
        };

        let token = frame.token().clone();
        let dispatched = self
            .registry
            .with_record(&token, |record| {
                let transition = machine::on_data(record, origin, frame);
                Self::dispatch(record, origin, transition)
            })
            .await;

        match dispatched {
            Some(dispatched) => self.settle(dispatched),
            None => self.refuse(origin, ProtocolError::UnknownSession(token.to_string())),
        }
    }

    /// Transport for `conn` closed.
    ///
    /// Clears every role it held and notifies each surviving peer. Records
    /// stay in the registry so the peer can reconnect.
    pub async fn disconnect(&self, conn: ConnectionId) -> usize {
        self.metrics.connections_open.fetch_sub(1, Ordering::Relaxed);

        let mut released = 0;
        for (_, record) in self.registry.snapshot() {
            let mut record = record.lock().await;
            if let Some(role) = record.role_of(conn) {
                Self::release(&mut record, role);
                released += 1;
            }
        }
        self.metrics
            .disconnects
            .fetch_add(released as u64, Ordering::Relaxed);
        tracing::debug!("{} closed, released {} role(s)", conn, released);
        released
    }

    /// One sweep pass over the registry.
    ///
    /// Treats closed transports as disconnects, expires idle sessions when
    /// configured, and deletes sessions nobody is bound to.
    pub async fn sweep(&self) -> SweepReport {
        let unclaimed_ttl = self.config.sweep.unclaimed_ttl();
        let idle_timeout = self.config.sweep.idle_timeout();
        let mut report = SweepReport::default();

        for (token, record) in self.registry.snapshot() {
            let mut guard = record.lock().await;

            for role in [Role::Sender, Role::Receiver] {
                if guard.peer(role).is_some_and(PeerHandle::is_closed) {
                    tracing::debug!("{:?}: {} transport found closed", token, role);
                    Self::release(&mut guard, role);
                    report.released += 1;
                }
            }

            if idle_timeout.is_some_and(|timeout| guard.idle_for() >= timeout) {
                Self::expire(&mut guard);
                drop(guard);
                if self.registry.delete(&token) {
                    report.expired += 1;
                    report.deleted += 1;
                }
                continue;
            }

            let dead = |r: &SessionRecord| r.is_empty() && (r.was_claimed() || r.age() >= unclaimed_ttl);
            if dead(&*guard) {
                drop(guard);
                if self.registry.remove_if(&token, dead) {
                    tracing::info!("{:?}: swept", token);
                    report.deleted += 1;
                }
            }
        }

        self.metrics
            .disconnects
            .fetch_add(report.released as u64, Ordering::Relaxed);
        self.metrics
            .sessions_swept
            .fetch_add(report.deleted as u64, Ordering::Relaxed);
        report
    }

    /// Unbind `role` and tell the other side.
    fn release(record: &mut SessionRecord, role: Role) {
        record.unbind_role(role);
        if let Some(survivor) = record.peer(role.other()) {
            survivor.reply(Reply::error(disconnect_notice(role)));
        }
        tracing::info!("{:?}: {} disconnected", record.token(), role);
    }

    fn expire(record: &mut SessionRecord) {
        tracing::info!("{:?}: idle for {:?}, cancelling", record.token(), record.idle_for());
        if !record.is_cancelled() && !record.is_drained() {
            record.cancel();
        }
        for role in [Role::Sender, Role::Receiver] {
            if let Some(peer) = record.peer(role) {
                peer.reply(Reply::Cancel);
            }
        }
    }

    /// Queue a transition's deliveries. Runs under the record lock.
    fn dispatch(record: &SessionRecord, origin: &PeerHandle, transition: Transition) -> Dispatched {
        let rejected = transition.is_rejection();
        let mut relayed_bytes = None;

        for delivery in transition.deliveries {
            let peer = match delivery.target {
                Target::Origin => Some(origin),
                Target::Role(role) => record.peer(role),
            };
            let Some(peer) = peer else {
                tracing::debug!(
                    "{:?}: {:?} not bound, dropping message",
                    record.token(),
                    delivery.target
                );
                continue;
            };

            let frame_len = match &delivery.message {
                Outgoing::Frame(bytes) => Some(bytes.len()),
                Outgoing::Reply(_) => None,
            };
            if peer.send(delivery.message) {
                relayed_bytes = relayed_bytes.or(frame_len);
            } else {
                tracing::debug!("{:?}: {} queue closed", record.token(), peer.id());
            }
        }

        Dispatched {
            events: transition.events,
            rejected,
            relayed_bytes,
        }
    }

    /// Update metrics and fire telemetry once the record lock is released.
    fn settle(&self, dispatched: Dispatched) {
        if dispatched.rejected {
            RelayMetrics::bump(&self.metrics.protocol_errors);
        }
        if let Some(bytes) = dispatched.relayed_bytes {
            RelayMetrics::bump(&self.metrics.frames_relayed);
            self.metrics
                .bytes_relayed
                .fetch_add(bytes as u64, Ordering::Relaxed);
        }
        for event in dispatched.events {
            self.record(event);
        }
    }

    fn refuse(&self, origin: &PeerHandle, error: ProtocolError) {
        tracing::warn!("{}: {}", origin.id(), error);
        RelayMetrics::bump(&self.metrics.protocol_errors);
        origin.reply(Reply::error(error.to_string()));
    }

    /// Fire-and-forget telemetry write.
    fn record(&self, event: TelemetryEvent) {
        let sink = self.telemetry.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let result = match &event {
                TelemetryEvent::FileInfo {
                    token,
                    info,
                    source,
                } => sink.record_file_info(token, &info.name, info.size, *source).await,
                TelemetryEvent::TransferComplete { token, info, dest } => {
                    sink.record_transfer_complete(
                        token,
                        info.as_ref().map(|i| i.name.as_str()),
                        info.as_ref().map(|i| i.size),
                        *dest,
                    )
                    .await
                }
            };
            if let Err(e) = result {
                tracing::warn!("telemetry write failed for {:?}: {}", event, e);
                RelayMetrics::bump(&metrics.telemetry_failures);
            }
        });
    }
}
