//! Error types for the transport layer.

/// Errors that can occur while dialing or using a channel.
///
/// None of these are fatal to a session: the connection manager treats
/// every one of them as "the channel is down" and keeps reconnecting
/// until told to stop.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Establishing the channel failed (DNS, TCP, WebSocket upgrade).
    #[error("dial failed: {0}")]
    DialFailed(std::io::Error),

    /// Sending a frame on an established channel failed.
    #[error("send failed: {0}")]
    SendFailed(std::io::Error),

    /// Receiving from an established channel failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(std::io::Error),

    /// The connection manager for this session is gone (explicit close
    /// or session teardown); no further sends are possible.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
}
