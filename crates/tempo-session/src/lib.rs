//! Session layer for the Tempo game client.
//!
//! Owns the local view of one game and the rules for keeping it
//! converged with the server: optimistic move application, verdict
//! correlation, rollback, and stale-fetch protection. Everything here
//! is synchronous and I/O-free; the `tempo` facade wires it to the
//! transport and the state store.

mod error;
mod reconcile;
mod rules;
mod store;

pub use error::SessionError;
pub use reconcile::{Action, Fallback, FetchTicket, PendingMove, Reconciler};
pub use rules::{AppliedMove, MoveRules, UncheckedRules};
pub use store::StateStore;

use tempo_protocol::CorrelationId;

/// Mints a fresh correlation id for one move attempt.
///
/// 128 random bits as lowercase hex. Never reused: a resubmission after
/// failure is a new attempt with a new id, so a late verdict for the
/// old attempt can't be mistaken for the new one.
pub fn mint_correlation_id() -> CorrelationId {
    let bits: u128 = rand::random();
    CorrelationId(format!("{bits:032x}"))
}
