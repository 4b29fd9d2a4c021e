//! Error types for the session layer.

/// Errors surfaced to the caller submitting moves and game actions.
///
/// All of them are local-session failures: nothing here means the game
/// itself ended or the connection is permanently gone.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The channel is down and the action cannot be performed
    /// optimistically (moves are queued instead; resignations and draw
    /// actions are not).
    #[error("not connected to the game service")]
    Offline,

    /// No game state has been loaded yet, so there is nothing to apply
    /// the action to.
    #[error("no game state loaded")]
    NoState,

    /// The game has already finished.
    #[error("game is over: {0}")]
    GameOver(String),

    /// The move failed local legality validation and was never sent.
    /// Server rejections arrive asynchronously and surface through the
    /// session view, not through this enum.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// Fetching authoritative state from the game service failed.
    #[error("state fetch failed: {0}")]
    Fetch(String),
}
