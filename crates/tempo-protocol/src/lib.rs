//! Wire dialect for the Tempo game client.
//!
//! This crate defines the "language" the client and the game service
//! speak over the realtime channel:
//!
//! - **Types** ([`ServerMessage`], [`ClientMessage`], [`GameSnapshot`],
//!   ids, clocks, moves) — the structures that travel on the wire and
//!   the client's typed view of game state.
//! - **Codec** ([`decode_server_frame`], [`encode_client_frame`]) —
//!   strict encoding out, lenient never-failing decoding in.
//! - **Errors** ([`ProtocolError`]) — what can go wrong on the outbound
//!   path.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw text frames) and the
//! session (reconciliation). It knows nothing about connections,
//! retries, or pending moves — only how frames map to types.
//!
//! ```text
//! Transport (text) → Protocol (ServerMessage) → Session (reconciliation)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode_server_frame, encode_client_frame};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, ClockPair, Color, CorrelationId, GameFinishedFrame, GameId,
    GameSnapshot, GameStateFrame, GameStatus, MoveAcceptedFrame, MoveRecord,
    MoveRejectedFrame, PlayerId, ServerMessage,
};
