//! Error type for the protocol layer.
//!
//! Deliberately small: inbound decoding is lossy-tolerant and cannot
//! fail (see `codec.rs`), so the only protocol-level failures are on the
//! outbound path.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound frame failed. With the frame types in
    /// this crate that indicates a bug rather than bad data.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),
}
