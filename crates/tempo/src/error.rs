//! Unified error type for the Tempo client.

use tempo_protocol::ProtocolError;
use tempo_session::SessionError;
use tempo_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tempo` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TempoError {
    /// A transport-level error (dial, send, recv, closed).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (offline, illegal move, rejection, fetch).
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let tempo_err: TempoError = err.into();
        assert!(matches!(tempo_err, TempoError::Transport(_)));
        assert!(tempo_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::IllegalMove("e9e9".into());
        let tempo_err: TempoError = err.into();
        assert!(matches!(tempo_err, TempoError::Session(_)));
        assert!(tempo_err.to_string().contains("e9e9"));
    }

    #[test]
    fn test_from_protocol_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let tempo_err: TempoError = ProtocolError::Encode(json_err).into();
        assert!(matches!(tempo_err, TempoError::Protocol(_)));
    }
}
