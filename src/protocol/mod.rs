//! Protocol module for gateway communication
//!
//! Defines the envelope schema and the closed set of message kinds exchanged
//! on the wire. The protocol uses JSON text frames over a persistent socket,
//! with a `type` discriminator selecting the variant schema.

mod envelope;

pub use envelope::*;
