//! Connection manager
//!
//! `RelayClient` is the public handle; behind it a single spawned actor task
//! owns the socket, every timer, the outbound queue, the reconnection
//! scheduler and the state machine. All state transitions, timer fires and
//! socket events are processed non-concurrently inside the actor's select
//! loop, so the core needs no locking beyond the shared state snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatcher::EventDispatcher;
use super::events::{ConnectionInfo, ConnectionState, TransportEvent, TransportKind};
use super::heartbeat::HeartbeatReporter;
use super::queue::{EnqueueOutcome, OutboundQueue};
use super::reconnect::ReconnectScheduler;
use crate::config::{ExhaustionPolicy, RelayConfig};
use crate::error::{Error, Result};
use crate::protocol::{CommandPayload, Envelope, HealthStatus, MessagePayload};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ─────────────────────────────────────────────────────────────────
// Command Channel
// ─────────────────────────────────────────────────────────────────

/// Commands sent from the handle to the connection actor
enum ClientCommand {
    Connect(oneshot::Sender<Result<()>>),
    Disconnect(oneshot::Sender<()>),
    Send(Envelope),
    SetHealth(HealthStatus),
    GetInfo(oneshot::Sender<ConnectionInfo>),
}

/// State snapshot shared between the actor and the handle
#[derive(Default)]
struct SharedState {
    status: ConnectionState,
    last_connected: Option<DateTime<Utc>>,
    reconnect_attempts: u32,
}

// ─────────────────────────────────────────────────────────────────
// Relay Client (public handle)
// ─────────────────────────────────────────────────────────────────

/// Handle to the gateway transport connection
pub struct RelayClient {
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    shared: Arc<RwLock<SharedState>>,
    dispatcher: EventDispatcher,
    client_id: String,
    connection_id: String,
    url: String,
}

impl RelayClient {
    /// Create a client and spawn its connection actor.
    ///
    /// The client starts Disconnected; call [`connect`](Self::connect) to
    /// establish the session. Must be called within a tokio runtime.
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate()?;

        let client_id = config
            .client
            .id
            .clone()
            .unwrap_or_else(|| format!("client-{}", Uuid::new_v4()));
        let connection_id = Uuid::new_v4().to_string();
        let url = config.transport.url.clone();

        let shared = Arc::new(RwLock::new(SharedState::default()));
        let dispatcher = EventDispatcher::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let actor = ClientActor::new(
            config,
            client_id.clone(),
            connection_id.clone(),
            shared.clone(),
            dispatcher.clone(),
            command_rx,
        );
        tokio::spawn(actor.run());

        Ok(Self {
            command_tx,
            shared,
            dispatcher,
            client_id,
            connection_id,
            url,
        })
    }

    /// Establish the connection.
    ///
    /// Resolves once the socket is open and any queued messages have been
    /// flushed; fails if the open attempt errors or exceeds the configured
    /// connect timeout. A failed attempt still arms automatic reconnection
    /// while attempts remain under the cap. Calling this after the cap was
    /// reached starts a fresh backoff cycle.
    pub async fn connect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(ClientCommand::Connect(tx))
            .map_err(|_| Error::Connection("client task stopped".to_string()))?;
        rx.await
            .map_err(|_| Error::Connection("client task stopped".to_string()))?
    }

    /// Tear the connection down.
    ///
    /// Idempotent: cancels any pending reconnect timer, stops the heartbeat,
    /// closes the socket cleanly and leaves the client in terminal
    /// Disconnected until the next explicit [`connect`](Self::connect).
    pub async fn disconnect(&self) {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(ClientCommand::Disconnect(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Send an envelope to the gateway.
    ///
    /// Sends immediately while Connected; otherwise the envelope is queued
    /// and flushed on the next Connected transition. Never fails for the
    /// disconnected case — the only error is a stopped client task.
    pub fn send_message(&self, envelope: Envelope) -> Result<()> {
        self.command_tx
            .send(ClientCommand::Send(envelope))
            .map_err(|_| Error::Connection("client task stopped".to_string()))
    }

    /// Build and send a Command envelope; returns the command id so the
    /// response (`response_to`) can be correlated.
    pub fn send_command(
        &self,
        command: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Result<String> {
        let envelope = Envelope::new(
            self.client_id.clone(),
            MessagePayload::Command(CommandPayload {
                command: command.into(),
                parameters,
                context: None,
                async_execution: false,
                timeout_ms: None,
                result_target: None,
                result_kind: None,
            }),
        );
        let id = envelope.id.clone();
        self.send_message(envelope)?;
        Ok(id)
    }

    /// Update the health status reported in heartbeats
    pub fn set_health(&self, health: HealthStatus) {
        let _ = self.command_tx.send(ClientCommand::SetHealth(health));
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.read().status
    }

    /// Snapshot of the connection for host UIs
    pub fn connection_info(&self) -> ConnectionInfo {
        let shared = self.shared.read();
        ConnectionInfo {
            id: self.connection_id.clone(),
            transport: TransportKind::WebSocket,
            status: shared.status,
            url: self.url.clone(),
            last_connected: shared.last_connected,
        }
    }

    /// Snapshot of the connection taken on the actor itself; unlike
    /// [`connection_info`](Self::connection_info) this round-trips through
    /// the command channel, so it observes all previously issued commands.
    pub async fn connection_info_synced(&self) -> Result<ConnectionInfo> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(ClientCommand::GetInfo(tx))
            .map_err(|_| Error::Connection("client task stopped".to_string()))?;
        rx.await
            .map_err(|_| Error::Connection("client task stopped".to_string()))
    }

    /// This client's identity, used as the `source` of outgoing envelopes
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Subscribe to every parsed inbound envelope
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.dispatcher.on_message(handler);
    }

    /// Subscribe to inbound envelopes of one kind
    pub fn on_kind<F>(&self, kind: crate::protocol::MessageKind, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.dispatcher.on_kind(kind, handler);
    }

    /// Subscribe to transport lifecycle events
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.dispatcher.on_event(handler);
    }

    /// The dispatcher itself, for hosts that wire subscriptions elsewhere
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }
}

// ─────────────────────────────────────────────────────────────────
// Connection Actor
// ─────────────────────────────────────────────────────────────────

struct ClientActor {
    config: RelayConfig,
    client_id: String,
    shared: Arc<RwLock<SharedState>>,
    dispatcher: EventDispatcher,
    command_rx: mpsc::UnboundedReceiver<ClientCommand>,
    connection_id: String,

    /// Owned socket slot; a fresh handle per (re)connect, never reused
    socket: Option<WsStream>,
    /// Bumped on every successful open; timer fires from an older
    /// generation are ignored
    generation: u64,
    heartbeat: Option<Interval>,
    reporter: HeartbeatReporter,
    queue: OutboundQueue,
    scheduler: ReconnectScheduler,
    /// Pending reconnect timer: (deadline, generation armed under, attempt)
    reconnect_at: Option<(Instant, u64, u32)>,
    last_activity: Option<i64>,
}

impl ClientActor {
    fn new(
        config: RelayConfig,
        client_id: String,
        connection_id: String,
        shared: Arc<RwLock<SharedState>>,
        dispatcher: EventDispatcher,
        command_rx: mpsc::UnboundedReceiver<ClientCommand>,
    ) -> Self {
        let reporter = HeartbeatReporter::new(client_id.clone(), &config.client);
        let queue = OutboundQueue::new(config.queue.capacity, config.queue.overflow_policy);
        let scheduler = ReconnectScheduler::new(
            Duration::from_millis(config.transport.reconnect_interval_ms),
            config.transport.max_reconnect_attempts,
        );

        Self {
            config,
            client_id,
            shared,
            dispatcher,
            command_rx,
            connection_id,
            socket: None,
            generation: 0,
            heartbeat: None,
            reporter,
            queue,
            scheduler,
            reconnect_at: None,
            last_activity: None,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd).await {
                                break;
                            }
                        }
                        None => {
                            debug!("All client handles dropped, stopping actor");
                            break;
                        }
                    }
                }

                frame = next_frame(&mut self.socket) => {
                    self.handle_frame(frame).await;
                }

                _ = heartbeat_tick(&mut self.heartbeat) => {
                    self.send_heartbeat().await;
                }

                _ = reconnect_wait(&self.reconnect_at) => {
                    self.handle_reconnect_fire().await;
                }
            }
        }

        // Drop the socket and timers with the actor
        if let Some(mut ws) = self.socket.take() {
            let _ = ws.close(None).await;
        }
        debug!("Client actor terminated");
    }

    /// Returns true when the actor should stop
    async fn handle_command(&mut self, cmd: ClientCommand) -> bool {
        match cmd {
            ClientCommand::Connect(reply) => {
                if self.state() == ConnectionState::Connected {
                    let _ = reply.send(Ok(()));
                    return false;
                }

                // Explicit connect overrides any in-flight reconnection and
                // starts a fresh backoff cycle.
                if self.scheduler.is_exhausted() {
                    info!("Resuming after exhausted reconnect attempts");
                }
                self.reconnect_at = None;
                self.scheduler.reset();
                self.shared.write().reconnect_attempts = 0;

                let result = self.establish().await;
                if result.is_err() {
                    self.arm_reconnect();
                }
                let _ = reply.send(result);
            }

            ClientCommand::Disconnect(reply) => {
                self.shutdown_clean().await;
                let _ = reply.send(());
            }

            ClientCommand::Send(envelope) => {
                self.send_or_queue(envelope).await;
            }

            ClientCommand::SetHealth(health) => {
                self.reporter.set_health(health);
            }

            ClientCommand::GetInfo(reply) => {
                let shared = self.shared.read();
                let _ = reply.send(ConnectionInfo {
                    id: self.connection_id.clone(),
                    transport: TransportKind::WebSocket,
                    status: shared.status,
                    url: self.config.transport.url.clone(),
                    last_connected: shared.last_connected,
                });
            }
        }
        false
    }

    // ─── Connection establishment ────────────────────────────────

    async fn establish(&mut self) -> Result<()> {
        let url = self.config.transport.url.clone();
        self.set_state(ConnectionState::Connecting);
        info!(url = %url, "Connecting to gateway");

        let request = self.build_request(&url)?;
        let timeout = Duration::from_millis(self.config.transport.connect_timeout_ms);

        match tokio::time::timeout(timeout, connect_async(request)).await {
            Ok(Ok((ws, _response))) => {
                self.on_open(ws).await;
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Failed to connect to gateway");
                let err = Error::connection_failed(&url, e.to_string());
                self.emit(TransportEvent::Error {
                    message: err.format_for_log(),
                    fatal: false,
                });
                self.set_state(ConnectionState::Disconnected);
                Err(err)
            }
            Err(_) => {
                warn!(url = %url, timeout_ms = timeout.as_millis() as u64, "Connection attempt timed out");
                let err = Error::connection_timeout(&url, timeout.as_millis() as u64);
                self.emit(TransportEvent::Error {
                    message: err.format_for_log(),
                    fatal: false,
                });
                self.set_state(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    fn build_request(
        &self,
        url: &str,
    ) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let mut request = url
            .into_client_request()
            .map_err(|e| Error::connection_failed(url, e.to_string()))?;

        let protocols = &self.config.transport.protocols;
        if !protocols.is_empty() {
            let joined = protocols.join(", ");
            let value = HeaderValue::from_str(&joined)
                .map_err(|e| Error::Config(format!("Invalid sub-protocol list: {}", e)))?;
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", value);
        }

        Ok(request)
    }

    async fn on_open(&mut self, ws: WsStream) {
        self.generation += 1;
        self.socket = Some(ws);
        self.reconnect_at = None;
        self.scheduler.reset();

        {
            let mut shared = self.shared.write();
            shared.last_connected = Some(Utc::now());
            shared.reconnect_attempts = 0;
        }
        self.set_state(ConnectionState::Connected);
        info!(generation = self.generation, "Gateway connection established");

        let mut interval = tokio::time::interval(Duration::from_millis(
            self.config.transport.heartbeat_interval_ms,
        ));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(interval);

        if self.drain_queue().await {
            self.emit(TransportEvent::Connected);
        }
    }

    /// Flush queued envelopes in FIFO order through the normal send path.
    /// Returns false when a write failed and tore the connection down.
    async fn drain_queue(&mut self) -> bool {
        if self.queue.is_empty() {
            return true;
        }
        debug!(pending = self.queue.len(), "Draining outbound queue");

        while let Some(envelope) = self.queue.pop_front() {
            if let Err(e) = self.write_envelope(&envelope).await {
                warn!(error = %e, id = %envelope.id, "Write failed while draining queue");
                self.queue.push_front(envelope);
                self.handle_unclean_close(e.to_string()).await;
                return false;
            }
        }
        true
    }

    // ─── Sending ─────────────────────────────────────────────────

    async fn send_or_queue(&mut self, envelope: Envelope) {
        if self.state() == ConnectionState::Connected && self.socket.is_some() {
            if let Err(e) = self.write_envelope(&envelope).await {
                warn!(error = %e, id = %envelope.id, "Send failed, connection lost");
                self.emit(TransportEvent::Error {
                    message: Error::connection_lost(e.to_string()).format_for_log(),
                    fatal: false,
                });
                self.handle_unclean_close(e.to_string()).await;
            }
        } else {
            match self.queue.enqueue(envelope) {
                EnqueueOutcome::Queued { id } => {
                    debug!(id = %id, pending = self.queue.len(), "Message queued while disconnected");
                    self.emit(TransportEvent::MessageQueued { id });
                }
                EnqueueOutcome::DroppedOldest { queued_id, dropped_id } => {
                    warn!(dropped = %dropped_id, "Outbound queue full, dropped oldest message");
                    self.emit(TransportEvent::Error {
                        message: format!("outbound queue full, dropped oldest message {}", dropped_id),
                        fatal: false,
                    });
                    self.emit(TransportEvent::MessageQueued { id: queued_id });
                }
                EnqueueOutcome::Rejected { id } => {
                    warn!(id = %id, "Outbound queue full, message rejected");
                    self.emit(TransportEvent::Error {
                        message: format!("outbound queue full, rejected message {}", id),
                        fatal: false,
                    });
                }
            }
        }
    }

    async fn write_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        let json = envelope
            .to_json()
            .map_err(|e| Error::Protocol(e.to_string()))?;
        let ws = self
            .socket
            .as_mut()
            .ok_or_else(|| Error::Connection("socket not open".to_string()))?;
        ws.send(WsMessage::Text(json)).await?;

        self.last_activity = Some(Utc::now().timestamp_millis());
        self.emit(TransportEvent::MessageSent {
            id: envelope.id.clone(),
        });
        Ok(())
    }

    async fn send_heartbeat(&mut self) {
        if self.state() != ConnectionState::Connected {
            return;
        }
        let payload = self.reporter.payload(self.last_activity);
        let envelope = Envelope::new(
            self.client_id.clone(),
            MessagePayload::Heartbeat(payload),
        );
        debug!(id = %envelope.id, health = ?self.reporter.health(), "Sending heartbeat");
        self.send_or_queue(envelope).await;
    }

    // ─── Inbound frames ──────────────────────────────────────────

    async fn handle_frame(&mut self, frame: Option<std::result::Result<WsMessage, WsError>>) {
        match frame {
            Some(Ok(WsMessage::Text(text))) => self.handle_inbound(text.as_bytes()),
            Some(Ok(WsMessage::Binary(data))) => self.handle_inbound(&data),
            Some(Ok(WsMessage::Ping(data))) => {
                if let Some(ws) = self.socket.as_mut() {
                    let _ = ws.send(WsMessage::Pong(data)).await;
                }
            }
            Some(Ok(WsMessage::Pong(_))) => {}
            Some(Ok(WsMessage::Close(close_frame))) => {
                info!(frame = ?close_frame, "Gateway closed the connection");
                self.handle_unclean_close("closed by peer".to_string()).await;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "WebSocket error");
                self.set_state(ConnectionState::Error);
                self.emit(TransportEvent::Error {
                    message: Error::connection_lost(e.to_string()).format_for_log(),
                    fatal: false,
                });
                self.handle_unclean_close(e.to_string()).await;
            }
            None => {
                info!("Gateway stream ended");
                self.handle_unclean_close("stream ended".to_string()).await;
            }
        }
    }

    /// Parse an inbound frame and hand it to the dispatcher. Malformed
    /// payloads produce a single error event; the connection stays open.
    fn handle_inbound(&mut self, bytes: &[u8]) {
        match Envelope::from_json_bytes(bytes) {
            Ok(envelope) => {
                debug!(id = %envelope.id, kind = %envelope.kind(), "Received message");
                self.last_activity = Some(Utc::now().timestamp_millis());
                self.dispatcher.dispatch(&envelope);
            }
            Err(e) => {
                warn!(error = %e, "Discarding malformed frame");
                self.emit(TransportEvent::Error {
                    message: Error::protocol_malformed(e.to_string()).format_for_log(),
                    fatal: false,
                });
            }
        }
    }

    // ─── Close handling ──────────────────────────────────────────

    /// Peer- or network-initiated closure: drop the socket, stop the
    /// heartbeat, and arm the next reconnection attempt if any remain.
    async fn handle_unclean_close(&mut self, reason: String) {
        if self.socket.is_none() && self.state() == ConnectionState::Disconnected {
            return;
        }
        self.socket = None;
        self.heartbeat = None;
        self.set_state(ConnectionState::Disconnected);
        self.emit(TransportEvent::Disconnected {
            reason,
            clean: false,
        });
        self.arm_reconnect();
    }

    /// Explicit disconnect(): cancel all timers, close cleanly, terminal.
    async fn shutdown_clean(&mut self) {
        self.reconnect_at = None;
        self.heartbeat = None;

        let was_active = self.state() != ConnectionState::Disconnected || self.socket.is_some();
        if let Some(mut ws) = self.socket.take() {
            let _ = ws.close(None).await;
        }
        self.set_state(ConnectionState::Disconnected);
        if was_active {
            info!("Disconnected by request");
            self.emit(TransportEvent::Disconnected {
                reason: "client disconnect".to_string(),
                clean: true,
            });
        }
    }

    // ─── Reconnection ────────────────────────────────────────────

    fn arm_reconnect(&mut self) {
        match self.scheduler.next_attempt() {
            Some((attempt, delay)) => {
                self.shared.write().reconnect_attempts = attempt;
                self.reconnect_at = Some((Instant::now() + delay, self.generation, attempt));
                info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
                self.emit(TransportEvent::Reconnecting { attempt, delay });
            }
            None => {
                let attempts = self.scheduler.attempts();
                warn!(attempts, "Reconnect attempts exhausted");
                if self.config.queue.exhaustion_policy == ExhaustionPolicy::Discard {
                    let dropped = self.queue.clear();
                    if dropped > 0 {
                        warn!(dropped, "Discarded queued messages after exhaustion");
                    }
                }
                self.emit(TransportEvent::ReconnectExhausted { attempts });
            }
        }
    }

    async fn handle_reconnect_fire(&mut self) {
        let Some((_, armed_generation, attempt)) = self.reconnect_at.take() else {
            return;
        };
        if armed_generation != self.generation {
            debug!(armed_generation, current = self.generation, "Ignoring stale reconnect timer");
            return;
        }

        info!(attempt, "Reconnecting to gateway");
        if self.establish().await.is_err() {
            self.arm_reconnect();
        }
    }

    // ─── State helpers ───────────────────────────────────────────

    fn state(&self) -> ConnectionState {
        self.shared.read().status
    }

    fn set_state(&mut self, state: ConnectionState) {
        let changed = {
            let mut shared = self.shared.write();
            if shared.status != state {
                shared.status = state;
                true
            } else {
                false
            }
        };
        if changed {
            debug!(state = ?state, "Connection state changed");
            self.emit(TransportEvent::StatusChange { state });
        }
    }

    fn emit(&self, event: TransportEvent) {
        self.dispatcher.emit(&event);
    }
}

// ─────────────────────────────────────────────────────────────────
// Select helpers
// ─────────────────────────────────────────────────────────────────

/// Next inbound frame, or pending forever while no socket is open
async fn next_frame(
    socket: &mut Option<WsStream>,
) -> Option<std::result::Result<WsMessage, WsError>> {
    match socket {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

/// Next heartbeat tick, or pending forever while disconnected
async fn heartbeat_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Sleep until the pending reconnect deadline, or forever if none is armed
async fn reconnect_wait(reconnect_at: &Option<(Instant, u64, u32)>) {
    match reconnect_at {
        Some((deadline, _, _)) => tokio::time::sleep_until(*deadline).await,
        None => std::future::pending().await,
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
