//! State-store hook for fetching authoritative game state.
//!
//! The session layer doesn't talk HTTP itself — that's the embedding
//! application's job (reqwest against the game service, a local cache,
//! whatever). Instead it defines the [`StateStore`] trait: the handful
//! of calls the reconciliation engine needs from the game service's
//! REST surface. Production implements it over HTTP; tests implement
//! it with scripted responses.

use tempo_protocol::{GameId, GameSnapshot};

use crate::SessionError;

/// The game service's request/response surface, as the session sees it.
///
/// `Send + Sync + 'static` so one store can be shared by the session
/// actor and the spawned fetch tasks; the `impl Future + Send` returns
/// keep those tasks spawnable on a multi-threaded runtime.
pub trait StateStore: Send + Sync + 'static {
    /// Fetches the authoritative state of a game.
    ///
    /// This is the recovery path for every divergence: opponent moves
    /// observed without a local correlation, rejected moves, frames for
    /// plies we've never seen.
    fn fetch_state(
        &self,
        game_id: &GameId,
    ) -> impl Future<Output = Result<GameSnapshot, SessionError>> + Send;

    /// Resigns the game on behalf of the local player. Returns the
    /// resulting (finished) state.
    fn resign(
        &self,
        game_id: &GameId,
    ) -> impl Future<Output = Result<GameSnapshot, SessionError>> + Send;

    /// Offers a draw to the opponent. Returns the updated state, which
    /// carries the outstanding offer.
    fn offer_draw(
        &self,
        game_id: &GameId,
    ) -> impl Future<Output = Result<GameSnapshot, SessionError>> + Send;

    /// Accepts the opponent's outstanding draw offer. Returns the
    /// resulting (finished) state.
    fn accept_draw(
        &self,
        game_id: &GameId,
    ) -> impl Future<Output = Result<GameSnapshot, SessionError>> + Send;
}
