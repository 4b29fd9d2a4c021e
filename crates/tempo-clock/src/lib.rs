//! Local clock projection for the Tempo game client.
//!
//! The server owns game time; the client never decides that a flag
//! fell. What this crate does is make the remaining time *look* alive
//! between server updates: a [`ClockSnapshot`] anchors the last
//! authoritative values to the instant they arrived, and
//! [`ClockSnapshot::project`] derives the displayed values for any
//! later instant — side to move ticking down, opponent frozen, floor
//! at zero. Projection is a pure function of the snapshot and `now`,
//! so any drift is corrected wholesale the moment the next server
//! update replaces the snapshot.
//!
//! [`ClockTicker`] provides the 1 Hz redraw cadence. It is built to
//! sit inside the session actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = ticker.wait() => {
//!             let shown = snapshot.project(Instant::now());
//!             // push to observers
//!         }
//!     }
//! }
//! ```
//!
//! While the game is not running the ticker is stopped and its future
//! pends forever, so `select!` simply never takes that branch.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

use tempo_protocol::{ClockPair, Color, GameSnapshot};

// ---------------------------------------------------------------------------
// Snapshot + projection
// ---------------------------------------------------------------------------

/// The last authoritative clock values, anchored to their arrival time.
///
/// Immutable once captured. A new snapshot is taken at every
/// server-derived sync point (state replace, accepted move, refetch);
/// locally optimistic changes never produce one, since the server has
/// not charged anyone for the move yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSnapshot {
    /// White's remaining time at `synced_at`, in milliseconds.
    pub white_ms: u64,
    /// Black's remaining time at `synced_at`, in milliseconds.
    pub black_ms: u64,
    /// Whose clock is charged for elapsed time. `None` freezes both.
    pub side_to_move: Option<Color>,
    /// Whether the game is in progress. A finished game's clocks are
    /// frozen at their final values.
    pub running: bool,
    /// When the server values were observed locally.
    pub synced_at: Instant,
}

impl ClockSnapshot {
    /// Anchors server clock values to a local instant.
    pub fn new(
        clocks: ClockPair,
        side_to_move: Option<Color>,
        running: bool,
        synced_at: Instant,
    ) -> Self {
        Self {
            white_ms: clocks.white_ms,
            black_ms: clocks.black_ms,
            side_to_move,
            running,
            synced_at,
        }
    }

    /// Captures a snapshot from a game state, if it carries clocks.
    pub fn from_game(game: &GameSnapshot, synced_at: Instant) -> Option<Self> {
        let clocks = game.clocks?;
        Some(Self::new(
            clocks,
            game.side_to_move,
            game.is_running(),
            synced_at,
        ))
    }

    /// Projects the displayed clock values at `now`.
    ///
    /// Only the side to move is charged for the time since `synced_at`,
    /// and only while the game is running. Values floor at zero; the
    /// server decides what a flag means.
    pub fn project(&self, now: Instant) -> ClockPair {
        let mut shown = ClockPair {
            white_ms: self.white_ms,
            black_ms: self.black_ms,
        };
        if !self.running {
            return shown;
        }
        let Some(side) = self.side_to_move else {
            return shown;
        };

        let elapsed_ms = now.saturating_duration_since(self.synced_at).as_millis()
            as u64;
        match side {
            Color::White => shown.white_ms = shown.white_ms.saturating_sub(elapsed_ms),
            Color::Black => shown.black_ms = shown.black_ms.saturating_sub(elapsed_ms),
        }
        trace!(
            white_ms = shown.white_ms,
            black_ms = shown.black_ms,
            "clock projected"
        );
        shown
    }
}

/// Formats remaining milliseconds as `m:ss` (e.g. `5:07`, `0:00`).
///
/// Rounds down: a clock showing `0:59` has at least 59 whole seconds
/// left. Hour-long clocks render as total minutes (`90:00`).
pub fn format_ms(ms: u64) -> String {
    let total_secs = ms / 1_000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Redraw cadence between server updates. One second per tick.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A start/stoppable fixed-period ticker.
///
/// Stopped is the idle state: [`ClockTicker::wait`] pends forever, so
/// a surrounding `tokio::select!` pays nothing for it. After each fired
/// tick the next deadline is `now + period` rather than
/// `deadline + period` — a late wakeup shifts the cadence instead of
/// bunching ticks.
#[derive(Debug)]
pub struct ClockTicker {
    period: Duration,
    /// Deadline of the next tick; `None` while stopped.
    next: Option<Instant>,
}

impl ClockTicker {
    /// A stopped ticker at the standard 1 Hz cadence.
    pub fn new() -> Self {
        Self::with_period(TICK_PERIOD)
    }

    /// A stopped ticker with a custom period.
    pub fn with_period(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// Starts ticking. The first tick fires one period from now.
    /// Idempotent: an already-running ticker keeps its deadline.
    pub fn start(&mut self) {
        if self.next.is_none() {
            self.next = Some(Instant::now() + self.period);
            debug!(period_ms = self.period.as_millis() as u64, "clock ticker started");
        }
    }

    /// Stops ticking; [`ClockTicker::wait`] pends until restarted.
    pub fn stop(&mut self) {
        if self.next.take().is_some() {
            debug!("clock ticker stopped");
        }
    }

    /// Whether the ticker is currently running.
    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// Waits for the next tick. Pends forever while stopped — safe for
    /// `tokio::select!`, which will still take its other branches.
    pub async fn wait(&mut self) {
        let Some(deadline) = self.next else {
            // This future never completes; select! handles other branches.
            std::future::pending::<()>().await;
            unreachable!()
        };
        time::sleep_until(deadline).await;
        self.next = Some(Instant::now() + self.period);
    }
}

impl Default for ClockTicker {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn clocks(white_ms: u64, black_ms: u64) -> ClockPair {
        ClockPair { white_ms, black_ms }
    }

    // -- Projection -------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_project_charges_only_side_to_move() {
        let snap = ClockSnapshot::new(
            clocks(60_000, 60_000),
            Some(Color::White),
            true,
            Instant::now(),
        );

        time::sleep(Duration::from_secs(3)).await;
        let shown = snap.project(Instant::now());

        assert_eq!(shown.white_ms, 57_000);
        assert_eq!(shown.black_ms, 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_project_black_to_move_charges_black() {
        let snap = ClockSnapshot::new(
            clocks(30_000, 45_000),
            Some(Color::Black),
            true,
            Instant::now(),
        );

        time::sleep(Duration::from_millis(2_500)).await;
        let shown = snap.project(Instant::now());

        assert_eq!(shown.white_ms, 30_000);
        assert_eq!(shown.black_ms, 42_500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_project_floors_at_zero() {
        let snap = ClockSnapshot::new(
            clocks(2_000, 60_000),
            Some(Color::White),
            true,
            Instant::now(),
        );

        time::sleep(Duration::from_secs(10)).await;
        let shown = snap.project(Instant::now());

        assert_eq!(shown.white_ms, 0);
        assert_eq!(shown.black_ms, 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_project_frozen_when_not_running() {
        let snap = ClockSnapshot::new(
            clocks(8_000, 12_000),
            Some(Color::Black),
            false,
            Instant::now(),
        );

        time::sleep(Duration::from_secs(30)).await;
        let shown = snap.project(Instant::now());

        assert_eq!(shown.white_ms, 8_000);
        assert_eq!(shown.black_ms, 12_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_project_frozen_without_side_to_move() {
        let snap =
            ClockSnapshot::new(clocks(8_000, 12_000), None, true, Instant::now());

        time::sleep(Duration::from_secs(5)).await;
        let shown = snap.project(Instant::now());

        assert_eq!(shown.white_ms, 8_000);
        assert_eq!(shown.black_ms, 12_000);
    }

    #[test]
    fn test_project_before_sync_instant_is_identity() {
        // A projection at (or before) the anchor charges nothing.
        let now = Instant::now();
        let snap =
            ClockSnapshot::new(clocks(10_000, 10_000), Some(Color::White), true, now);
        let shown = snap.project(now);
        assert_eq!(shown.white_ms, 10_000);
        assert_eq!(shown.black_ms, 10_000);
    }

    fn game(json: &str) -> GameSnapshot {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_from_game_requires_clocks() {
        let g = game(r#"{"gameId":"g","whiteId":"w","blackId":"b","fen":"f"}"#);
        assert!(ClockSnapshot::from_game(&g, Instant::now()).is_none());
    }

    #[test]
    fn test_from_game_captures_side_and_running() {
        let g = game(
            r#"{
                "gameId": "g", "whiteId": "w", "blackId": "b", "fen": "f",
                "clocks": {"whiteMs": 300000, "blackMs": 300000},
                "status": "RUNNING",
                "sideToMove": "BLACK"
            }"#,
        );
        let snap = ClockSnapshot::from_game(&g, Instant::now()).unwrap();
        assert_eq!(snap.side_to_move, Some(Color::Black));
        assert!(snap.running);
    }

    // -- Formatting -------------------------------------------------------

    #[test]
    fn test_format_ms_renders_minutes_and_seconds() {
        assert_eq!(format_ms(300_000), "5:00");
        assert_eq!(format_ms(307_000), "5:07");
        assert_eq!(format_ms(59_999), "0:59");
        assert_eq!(format_ms(999), "0:00");
        assert_eq!(format_ms(0), "0:00");
        assert_eq!(format_ms(5_400_000), "90:00");
    }

    // -- Ticker -----------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_ticker_fires_once_per_period() {
        let mut ticker = ClockTicker::new();
        ticker.start();

        let t0 = Instant::now();
        ticker.wait().await;
        assert_eq!((Instant::now() - t0).as_secs(), 1);
        ticker.wait().await;
        assert_eq!((Instant::now() - t0).as_secs(), 2);
        ticker.wait().await;
        assert_eq!((Instant::now() - t0).as_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_pends_while_stopped() {
        let mut ticker = ClockTicker::new();
        assert!(!ticker.is_running());

        // A stopped ticker must never win this race.
        tokio::select! {
            _ = ticker.wait() => panic!("stopped ticker fired"),
            _ = time::sleep(Duration::from_secs(60)) => {}
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_stop_then_start_resets_deadline() {
        let mut ticker = ClockTicker::new();
        ticker.start();
        ticker.wait().await;

        ticker.stop();
        time::sleep(Duration::from_secs(10)).await;

        ticker.start();
        let t0 = Instant::now();
        ticker.wait().await;
        // No burst of catch-up ticks from the stopped stretch.
        assert_eq!((Instant::now() - t0).as_secs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_ticks_drain_three_seconds_from_running_clock() {
        let snap = ClockSnapshot::new(
            clocks(60_000, 60_000),
            Some(Color::White),
            true,
            Instant::now(),
        );
        let mut ticker = ClockTicker::new();
        ticker.start();

        let mut shown = snap.project(Instant::now());
        for _ in 0..3 {
            ticker.wait().await;
            shown = snap.project(Instant::now());
        }

        assert_eq!(shown.white_ms, 57_000);
        assert_eq!(shown.black_ms, 60_000);
    }
}
