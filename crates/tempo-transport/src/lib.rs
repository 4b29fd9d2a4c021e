//! Transport layer for the Tempo game client.
//!
//! Provides the [`Dialer`] and [`Link`] traits that abstract over the
//! outbound channel, the WebSocket implementation, the fixed backoff
//! schedule, and the [`ConnectionManager`] that owns the one live
//! channel per game session.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket dialing via `tokio-tungstenite`

pub mod backoff;
mod error;
mod manager;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use manager::{ConnectOptions, ConnectionHandle, ConnectionManager, LinkEvent};
#[cfg(feature = "websocket")]
pub use websocket::{WsDialer, WsLink};

use std::fmt;
use std::future::Future;

/// Advisory connection status reported to consumers.
///
/// Advisory means: useful for a UI badge, not authoritative for game
/// legality — the server decides what was actually received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    /// The channel is open and frames flow.
    Connected,
    /// The channel dropped without an explicit close; a reconnect
    /// attempt is scheduled or in flight.
    Reconnecting,
    /// Explicitly closed. Terminal for the session — no further
    /// reconnect attempts will be made.
    Disconnected,
}

impl fmt::Display for ConnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Establishes outbound channels.
///
/// The trait exists so the connection manager's retry/queue/SYNC
/// behavior can be driven by a scripted in-memory dialer in tests;
/// production uses [`WsDialer`]. The `impl Future + Send` return keeps
/// the manager spawnable on a multi-threaded runtime.
pub trait Dialer: Send + Sync + 'static {
    /// The channel type produced by this dialer.
    type Link: Link;

    /// Opens a channel to the given URL.
    fn dial(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;
}

/// A single established channel carrying text frames.
///
/// Exclusively owned by the connection manager task, hence `&mut self`
/// throughout — no internal locking needed.
pub trait Link: Send + 'static {
    /// Sends one text frame to the remote peer.
    fn send(
        &mut self,
        frame: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next text frame.
    ///
    /// Returns `Ok(None)` when the channel is cleanly closed by the
    /// peer. Must be cancel-safe: the manager polls it inside
    /// `tokio::select!`.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Closes the channel. Best-effort; errors are ignored by callers.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conn_status_display_matches_wire_vocabulary() {
        assert_eq!(ConnStatus::Connected.to_string(), "connected");
        assert_eq!(ConnStatus::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnStatus::Disconnected.to_string(), "disconnected");
    }
}
