//! Reconnect delay schedule.
//!
//! A fixed, capped sequence rather than exponential-with-jitter: the
//! server-side rate concern here is one idle game client, and a
//! predictable schedule is easier to reason about (and to test) than a
//! randomized one. The final value repeats forever — reconnection is
//! perpetual while the session is open.

use std::time::Duration;

/// Delays between reconnect attempts, indexed by the attempt counter.
pub const BACKOFF_MS: [u64; 5] = [1_000, 2_000, 5_000, 10_000, 30_000];

/// Delay before reconnect attempt `attempt` (0-based), capped at the
/// last entry of [`BACKOFF_MS`].
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let idx = (attempt as usize).min(BACKOFF_MS.len() - 1);
    Duration::from_millis(BACKOFF_MS[idx])
}
