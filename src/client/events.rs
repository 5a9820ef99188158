//! Connection state and lifecycle event types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Attempting to connect
    Connecting,
    /// Connected and ready
    Connected,
    /// Not connected
    Disconnected,
    /// Transport fault observed; usually followed by a close
    Error,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

/// Underlying transport flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[serde(rename = "websocket")]
    WebSocket,
    Http,
    Rpc,
}

/// Snapshot of the connection as seen by a host application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Connection identifier, stable for the client session
    pub id: String,

    /// Transport flavor
    pub transport: TransportKind,

    /// Current state
    pub status: ConnectionState,

    /// Gateway endpoint
    pub url: String,

    /// When the connection last reached Connected
    pub last_connected: Option<DateTime<Utc>>,
}

/// Lifecycle events emitted by the transport to host applications
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The socket reached an open state and the queue was drained
    Connected,

    /// The socket closed; `clean` is true only for explicit disconnect()
    Disconnected { reason: String, clean: bool },

    /// A message was written to the socket
    MessageSent { id: String },

    /// A message was buffered while disconnected
    MessageQueued { id: String },

    /// A reconnection attempt is scheduled
    Reconnecting { attempt: u32, delay: Duration },

    /// The state machine moved to a new state
    StatusChange { state: ConnectionState },

    /// The reconnect attempt cap was reached; no further automatic attempts
    ReconnectExhausted { attempts: u32 },

    /// A non-fatal fault (protocol error, send failure, queue overflow)
    Error { message: String, fatal: bool },
}
