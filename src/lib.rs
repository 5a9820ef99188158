//! Resilient WebSocket transport client for gateway messaging.
//!
//! The crate maintains a persistent bidirectional connection to a message
//! gateway and keeps it healthy without host involvement: messages sent
//! while offline are queued and flushed on reconnect, lost connections are
//! retried with exponential backoff, and periodic heartbeats carry client
//! health upstream. Inbound traffic is fanned out through a typed event
//! dispatcher.
//!
//! ```no_run
//! use relay_client::{RelayClient, RelayConfig};
//!
//! # async fn run() -> relay_client::Result<()> {
//! let config = RelayConfig::for_url("wss://gateway.example.com/ws");
//! let client = RelayClient::new(config)?;
//!
//! client.on_message(|envelope| {
//!     println!("received {}", envelope.id);
//! });
//!
//! client.connect().await?;
//! client.send_command("status.report", serde_json::json!({}))?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;

pub use client::{
    ConnectionInfo, ConnectionState, EventDispatcher, RelayClient, TransportEvent, TransportKind,
};
pub use config::{ExhaustionPolicy, OverflowPolicy, RelayConfig};
pub use error::{Error, ErrorCode, Result};
pub use protocol::{Envelope, HealthStatus, MessageKind, MessagePayload};
