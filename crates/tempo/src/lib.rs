//! # Tempo
//!
//! Resilient realtime client for server-authoritative clocked chess
//! games played over an unreliable WebSocket channel.
//!
//! The server is the referee: it owns positions, clocks, and results.
//! Tempo's job is to keep a local view of one game converged with the
//! server's through disconnects, frame loss, and out-of-order delivery
//! — reconnecting with backoff, queueing moves while the channel is
//! down, applying moves optimistically and rolling them back when the
//! server disagrees, and projecting live clock values between updates.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tempo::prelude::*;
//!
//! let client = GameClient::connect(
//!     my_state_store,           // impl StateStore (the REST surface)
//!     UncheckedRules,           // or a real move validator
//!     ClientConfig {
//!         base_url: "wss://play.example".into(),
//!         game_id: GameId("…".into()),
//!         token: session_token,
//!     },
//! );
//!
//! let mut view = client.view();
//! client.submit_move("e2e4").await?;
//! view.changed().await?;
//! println!("{:?}", view.borrow().snapshot);
//! ```

mod client;
mod error;

pub use client::{ClientConfig, GameClient, SessionView};
pub use error::TempoError;

/// Commonly used items, re-exported for one-line imports.
pub mod prelude {
    pub use crate::{ClientConfig, GameClient, SessionView, TempoError};
    pub use tempo_clock::format_ms;
    pub use tempo_protocol::{
        ClockPair, Color, GameId, GameSnapshot, GameStatus, PlayerId,
    };
    pub use tempo_session::{
        AppliedMove, MoveRules, SessionError, StateStore, UncheckedRules,
    };
    pub use tempo_transport::ConnStatus;
    #[cfg(feature = "websocket")]
    pub use tempo_transport::WsDialer;
}
