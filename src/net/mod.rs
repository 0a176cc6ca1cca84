//! Wire Transport
//!
//! Upgrade handshake, frame codec, per-socket connection driver, and the
//! session JSON protocol. Everything below [`protocol`] is game-agnostic:
//! bytes in, frames out.

pub mod connection;
pub mod frame;
pub mod handshake;
pub mod protocol;

pub use connection::{accept, Connection, ConnectionEvent};
pub use protocol::{ClientMessage, RoomEvent, ServerMessage};
