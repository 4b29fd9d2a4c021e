//! Move-legality hook for the optimistic apply.
//!
//! The session layer doesn't embed a chess engine. What it needs is
//! small: given the current position and a candidate move, either the
//! position after the move (for the optimistic echo) or a refusal (so
//! an obviously illegal move never reaches the wire). The [`MoveRules`]
//! trait is that seam — plug in a real move generator, or use
//! [`UncheckedRules`] and let the server be the only judge.

use crate::SessionError;

/// The result of locally applying a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Position after the move, in FEN.
    pub fen_after: String,
    /// Human-readable notation, when the rules implementation can
    /// produce one.
    pub san: Option<String>,
}

/// Validates and applies a candidate move to a position.
///
/// Synchronous on purpose: legality is a pure function of the position,
/// and the reconciliation engine calls it inline before anything is
/// sent or displayed.
pub trait MoveRules: Send + Sync + 'static {
    /// Applies `uci` to the position in `fen`.
    ///
    /// # Errors
    /// [`SessionError::IllegalMove`] when the move is not legal in this
    /// position. The move is then never transmitted.
    fn apply(&self, fen: &str, uci: &str) -> Result<AppliedMove, SessionError>;
}

/// Accepts every move without validating it.
///
/// The position is left unchanged (the server's accept/reject verdict
/// will bring the real one), so the optimistic echo is limited to the
/// move list. Fine for bots and tests; interactive UIs want a real
/// rules implementation for instant board feedback.
#[derive(Debug, Clone, Copy, Default)]
pub struct UncheckedRules;

impl MoveRules for UncheckedRules {
    fn apply(&self, fen: &str, _uci: &str) -> Result<AppliedMove, SessionError> {
        Ok(AppliedMove {
            fen_after: fen.to_owned(),
            san: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchecked_rules_accepts_anything_and_keeps_position() {
        let applied = UncheckedRules.apply("some-fen", "zz99").unwrap();
        assert_eq!(applied.fen_after, "some-fen");
        assert_eq!(applied.san, None);
    }
}
