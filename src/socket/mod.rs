//! WebSocket Messaging
//!
//! A single-connection client speaking tagged JSON frames, on top of a
//! tokio-tungstenite transport.

mod client;
mod manager;
mod protocol;

pub use client::{ConnectionState, SocketClient, dispatch};
pub use manager::{CLOSE_ABNORMAL, CLOSE_TIMEOUT, ConnectionId, SocketEvent, Transport, TransportError};
pub use protocol::*;
