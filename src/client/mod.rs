//! Gateway transport client
//!
//! Owns the WebSocket connection to the gateway, including:
//! - Connection establishment with auto-reconnect and exponential backoff
//! - Heartbeat broadcasting while connected
//! - Message queuing during disconnection, drained FIFO on reconnect
//! - Typed event dispatch for inbound envelopes and lifecycle events

mod dispatcher;
mod events;
mod heartbeat;
mod manager;
mod queue;
mod reconnect;

pub use dispatcher::EventDispatcher;
pub use events::{ConnectionInfo, ConnectionState, TransportEvent, TransportKind};
pub use manager::RelayClient;
