//! The reconciliation engine: keeps the local game view converged with
//! the server's, no matter what order frames arrive in.
//!
//! This is a pure state machine. It never performs I/O — every decision
//! comes back as an [`Action`] for the session actor to execute, and
//! every fetch result comes back in through [`Reconciler::complete_refetch`].
//! That split is what makes the whole merge logic testable without a
//! network.
//!
//! # The rules, in one place
//!
//! - `GAME_STATE` replaces the snapshot wholesale.
//! - `MOVE_ACCEPTED` carrying *our* correlation id confirms the
//!   optimistic move: merge the frame's position and clocks in place.
//! - `MOVE_ACCEPTED` without our correlation id means the opponent
//!   moved (or a replay): refetch authoritative state, falling back to
//!   the frame's position and clocks if the fetch fails.
//! - `MOVE_REJECTED` targeting the tracked pending move rolls it back
//!   immediately, then refetches to be sure; a rejection of an
//!   abandoned attempt refetches without touching the newer move.
//! - `GAME_FINISHED` merges the terminal result in place without
//!   touching the position or move list.
//!
//! # Revisions
//!
//! Refetches run concurrently with the frame stream, so a fetch started
//! before a newer frame landed can deliver stale state. Every local
//! mutation bumps a revision counter; a [`FetchTicket`] captures the
//! revision at issue time, and a completing fetch is applied only if
//! the revision hasn't moved since. Anything staler is discarded —
//! a later sync heals whatever that fetch would have brought.

use tempo_protocol::{
    ClientMessage, ClockPair, CorrelationId, GameFinishedFrame, GameSnapshot,
    GameStatus, MoveAcceptedFrame, MoveRecord, MoveRejectedFrame, ServerMessage,
};
use tracing::{debug, warn};

use crate::{MoveRules, SessionError};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// One optimistic move awaiting the server's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    /// Token echoed back by the server in its verdict.
    pub correlation_id: CorrelationId,
    /// The move as submitted.
    pub uci: String,
    /// Position before the optimistic apply, for rollback.
    pub fen_before: String,
    /// Session-unique attempt number. Distinguishes verdicts for an
    /// abandoned attempt from the current one when the two share a
    /// correlation id (they never should, but the counter makes the
    /// ordering auditable in logs).
    pub attempt: u64,
}

/// Proof of which state a refetch was issued against.
///
/// Opaque; produced inside an [`Action`] and consumed by
/// [`Reconciler::complete_refetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    revision: u64,
}

/// Position and clocks to fall back on when a refetch fails, salvaged
/// from the frame that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub fen: String,
    pub clocks: Option<ClockPair>,
}

/// What the session actor must do after a frame was reconciled.
#[derive(Debug, PartialEq)]
pub enum Action {
    /// Nothing further; local state is already converged.
    None,
    /// Fetch authoritative state and feed the result to
    /// [`Reconciler::complete_refetch`] with this ticket.
    Refetch {
        ticket: FetchTicket,
        fallback: Option<Fallback>,
    },
    /// Surface the server's rejection to the caller, then refetch. The
    /// optimistic move has already been rolled back.
    Reject {
        reason: String,
        ticket: FetchTicket,
    },
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// The local game view and the merge rules that maintain it.
///
/// One per game session, owned by the session actor.
#[derive(Debug, Default)]
pub struct Reconciler {
    snapshot: Option<GameSnapshot>,
    pending: Option<PendingMove>,
    /// Monotonic count of move submissions this session.
    attempt_seq: u64,
    /// Bumped on every accepted mutation; stale fetches compare against it.
    revision: u64,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current local view, if any state has been loaded.
    pub fn snapshot(&self) -> Option<&GameSnapshot> {
        self.snapshot.as_ref()
    }

    /// The optimistic move awaiting a verdict, if any.
    pub fn pending(&self) -> Option<&PendingMove> {
        self.pending.as_ref()
    }

    /// Highest ply observed, for the SYNC handshake. 0 before any state.
    pub fn last_seen_ply(&self) -> u32 {
        self.snapshot.as_ref().map_or(0, GameSnapshot::last_seen_ply)
    }

    fn ticket(&self) -> FetchTicket {
        FetchTicket {
            revision: self.revision,
        }
    }

    // -- Wholesale replacement ---------------------------------------------

    /// Replaces the local view with authoritative state (initial load,
    /// refetch result, or the outcome of a resign/draw call).
    ///
    /// Replaces even when the incoming state is *behind* the local view
    /// — the server is authoritative and a SYNC replay will close the
    /// gap — but logs the regression since it usually means frames for
    /// this game arrived out of order.
    pub fn replace(&mut self, state: GameSnapshot) {
        let old_ply = self.last_seen_ply();
        let new_ply = state.last_seen_ply();
        if new_ply < old_ply {
            warn!(
                game_id = %state.game_id,
                old_ply,
                new_ply,
                "authoritative state is behind local view, replacing anyway"
            );
        }
        self.snapshot = Some(state);
        self.pending = None;
        self.revision += 1;
    }

    // -- Move submission ----------------------------------------------------

    /// Validates and optimistically applies a local move, returning the
    /// frame to transmit.
    ///
    /// The optimistic apply updates the position and appends the move
    /// to the list, but deliberately does *not* flip the side to move:
    /// until the server confirms, the submitter's clock keeps running.
    ///
    /// A new submission discards tracking of any prior pending move:
    /// only the newest attempt is correlated against incoming verdicts,
    /// so a late verdict for the abandoned one takes the uncorrelated
    /// path (refetch) instead of merging in place.
    ///
    /// # Errors
    /// - [`SessionError::NoState`] before any state is loaded
    /// - [`SessionError::GameOver`] once the game has finished
    /// - [`SessionError::IllegalMove`] when local validation refuses it
    pub fn submit<R: MoveRules>(
        &mut self,
        correlation_id: CorrelationId,
        uci: &str,
        rules: &R,
    ) -> Result<ClientMessage, SessionError> {
        let snap = self.snapshot.as_mut().ok_or(SessionError::NoState)?;
        if snap.status == Some(GameStatus::Finished) {
            let result = snap.result.clone().unwrap_or_else(|| "finished".into());
            return Err(SessionError::GameOver(result));
        }
        let applied = rules.apply(&snap.fen, uci)?;

        if let Some(old) = self.pending.take() {
            debug!(
                correlation_id = %old.correlation_id,
                attempt = old.attempt,
                "discarding tracking of prior pending move"
            );
        }

        self.attempt_seq += 1;
        let attempt = self.attempt_seq;
        let fen_before = std::mem::replace(&mut snap.fen, applied.fen_after.clone());
        let ply = snap.last_seen_ply() + 1;
        snap.moves.push(MoveRecord {
            ply,
            uci: uci.to_owned(),
            san: applied.san,
            fen_after: Some(applied.fen_after),
        });

        debug!(
            game_id = %snap.game_id,
            correlation_id = %correlation_id,
            attempt,
            ply,
            uci,
            "optimistic move applied"
        );

        let frame = ClientMessage::Move {
            game_id: snap.game_id.clone(),
            client_move_id: correlation_id.clone(),
            uci: uci.to_owned(),
        };
        self.pending = Some(PendingMove {
            correlation_id,
            uci: uci.to_owned(),
            fen_before,
            attempt,
        });
        self.revision += 1;
        Ok(frame)
    }

    /// Rolls back the optimistic move, if one is outstanding. Used when
    /// the server rejects it, and by the session when a submission
    /// can't be transmitted at all.
    pub fn rollback_pending(&mut self) -> Option<PendingMove> {
        let pending = self.pending.take()?;
        if let Some(snap) = self.snapshot.as_mut() {
            snap.fen = pending.fen_before.clone();
            // Drop the optimistic record if it's still the tail.
            if snap.moves.last().map(|m| m.uci.as_str()) == Some(pending.uci.as_str())
            {
                snap.moves.pop();
            }
        }
        self.revision += 1;
        debug!(
            correlation_id = %pending.correlation_id,
            attempt = pending.attempt,
            "optimistic move rolled back"
        );
        Some(pending)
    }

    // -- Inbound frames -----------------------------------------------------

    /// Reconciles one decoded server frame into the local view.
    pub fn handle_server(&mut self, msg: ServerMessage) -> Action {
        match msg {
            ServerMessage::GameState(frame) => {
                if self.wrong_game(&frame.game_id) {
                    return Action::None;
                }
                self.replace(frame.into_snapshot());
                Action::None
            }
            ServerMessage::MoveAccepted(frame) => {
                if self.wrong_game(&frame.game_id) {
                    return Action::None;
                }
                self.on_move_accepted(frame)
            }
            ServerMessage::MoveRejected(frame) => {
                if self.wrong_game(&frame.game_id) {
                    return Action::None;
                }
                self.on_move_rejected(frame)
            }
            ServerMessage::GameFinished(frame) => {
                if self.wrong_game(&frame.game_id) {
                    return Action::None;
                }
                self.on_game_finished(frame)
            }
            ServerMessage::Unknown { raw_type, .. } => {
                warn!(raw_type, "ignoring unrecognized server frame");
                Action::None
            }
        }
    }

    fn wrong_game(&self, game_id: &tempo_protocol::GameId) -> bool {
        match self.snapshot.as_ref() {
            Some(snap) if &snap.game_id != game_id => {
                warn!(
                    expected = %snap.game_id,
                    got = %game_id,
                    "frame for a different game, ignoring"
                );
                true
            }
            _ => false,
        }
    }

    fn on_move_accepted(&mut self, frame: MoveAcceptedFrame) -> Action {
        let correlated = match (&self.pending, &frame.client_move_id) {
            (Some(pending), Some(id)) => &pending.correlation_id == id,
            _ => false,
        };

        if !correlated {
            // Opponent's move, or a replay for a ply we haven't seen.
            // Authoritative truth comes from a refetch; keep the frame's
            // position and clocks as the degraded fallback.
            debug!(game_id = %frame.game_id, ply = ?frame.ply, "uncorrelated move, refetching");
            return Action::Refetch {
                ticket: self.ticket(),
                fallback: Some(Fallback {
                    fen: frame.fen,
                    clocks: frame.clocks,
                }),
            };
        }

        // Our optimistic move, confirmed. Merge the server's position
        // and clocks in place; the move record we appended becomes real.
        let Some(pending) = self.pending.take() else {
            return Action::None;
        };
        let Some(snap) = self.snapshot.as_mut() else {
            return Action::None;
        };
        snap.fen = frame.fen.clone();
        if frame.clocks.is_some() {
            snap.clocks = frame.clocks;
        }
        if let Some(rec) = snap
            .moves
            .last_mut()
            .filter(|m| m.uci == pending.uci)
        {
            rec.fen_after = Some(frame.fen);
            if let Some(ply) = frame.ply {
                rec.ply = ply;
            }
        }
        // Confirmation hands the move to the opponent.
        snap.side_to_move = snap.side_to_move.map(|c| c.other());
        self.revision += 1;

        debug!(
            correlation_id = %pending.correlation_id,
            attempt = pending.attempt,
            "move confirmed"
        );
        Action::None
    }

    fn on_move_rejected(&mut self, frame: MoveRejectedFrame) -> Action {
        warn!(
            game_id = %frame.game_id,
            correlation_id = ?frame.client_move_id,
            reason = %frame.reason,
            "move rejected by server"
        );
        // A verdict for an abandoned attempt must not roll back the
        // newer optimistic move: only a rejection of the tracked
        // pending triggers the rollback.
        let targets_tracked = match (&self.pending, &frame.client_move_id) {
            (Some(pending), Some(id)) => &pending.correlation_id == id,
            (Some(_), None) => false,
            (None, _) => true,
        };
        if !targets_tracked {
            return Action::Refetch {
                ticket: self.ticket(),
                fallback: None,
            };
        }
        self.rollback_pending();
        Action::Reject {
            reason: frame.reason,
            ticket: self.ticket(),
        }
    }

    fn on_game_finished(&mut self, frame: GameFinishedFrame) -> Action {
        let Some(snap) = self.snapshot.as_mut() else {
            // Terminal news for a game we never loaded: fetch the whole
            // thing instead of inventing a partial snapshot.
            return Action::Refetch {
                ticket: self.ticket(),
                fallback: None,
            };
        };
        snap.status = Some(GameStatus::Finished);
        snap.result = Some(frame.result);
        snap.finish_reason = Some(frame.reason);
        self.pending = None;
        self.revision += 1;
        Action::None
    }

    // -- Refetch completion -------------------------------------------------

    /// Applies the outcome of a refetch issued earlier, unless local
    /// state has moved on since (the ticket is stale).
    ///
    /// On a successful fetch the snapshot is replaced wholesale. On a
    /// failed fetch the `fallback` (when present) patches position and
    /// clocks so the display degrades instead of freezing. Returns
    /// whether anything was applied.
    pub fn complete_refetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<GameSnapshot, SessionError>,
        fallback: Option<Fallback>,
    ) -> bool {
        if ticket.revision != self.revision {
            debug!(
                issued_at = ticket.revision,
                current = self.revision,
                "discarding stale fetch result"
            );
            return false;
        }
        match result {
            Ok(state) => {
                self.replace(state);
                true
            }
            Err(e) => {
                warn!(error = %e, "state refetch failed");
                let (Some(fb), Some(snap)) = (fallback, self.snapshot.as_mut())
                else {
                    return false;
                };
                snap.fen = fb.fen;
                if fb.clocks.is_some() {
                    snap.clocks = fb.clocks;
                }
                self.revision += 1;
                true
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
