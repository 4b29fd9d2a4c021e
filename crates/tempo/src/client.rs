//! The game client: one task per game that wires transport, session,
//! and clock together.
//!
//! [`GameClient`] is a cheap handle; the work happens in a single actor
//! task that owns the [`Reconciler`], the clock snapshot, and the
//! connection manager's event stream. Commands travel in over an mpsc
//! channel with oneshot replies; observable state travels out through a
//! `watch` channel as [`SessionView`] — UIs just watch it and redraw.
//!
//! Refetches run as spawned tasks so a slow REST call never blocks
//! frame handling; their results come back tagged with the
//! [`FetchTicket`](tempo_session::FetchTicket) that lets the reconciler
//! discard anything stale.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tempo_clock::{ClockSnapshot, ClockTicker};
use tempo_protocol::{decode_server_frame, ClockPair, GameId, GameSnapshot};
use tempo_session::{
    mint_correlation_id, Action, Fallback, FetchTicket, MoveRules, Reconciler,
    SessionError, StateStore,
};
use tempo_transport::{
    ConnStatus, ConnectOptions, ConnectionHandle, ConnectionManager, Dialer,
    LinkEvent, TransportError,
};

use crate::TempoError;

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// Everything needed to join one game.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the realtime endpoint, e.g. `wss://play.example`.
    pub base_url: String,
    pub game_id: GameId,
    /// Caller credential, passed through to the channel URL.
    pub token: String,
}

/// The observable state of one game session, published on every change
/// and once per second while a clock is running.
#[derive(Debug, Clone)]
pub struct SessionView {
    /// Advisory channel status, for a UI badge.
    pub status: ConnStatus,
    /// The local game view; `None` until the first load succeeds.
    pub snapshot: Option<GameSnapshot>,
    /// Displayed clock values, projected to the publish instant.
    pub clocks: Option<ClockPair>,
    /// The most recent surfaced failure (rejection reason, fetch
    /// error). Sticky until the next one; purely informational.
    pub last_error: Option<String>,
}

/// Handle to a running game session. Cheap to clone; dropping the last
/// handle shuts the session down.
#[derive(Clone)]
pub struct GameClient {
    commands: mpsc::UnboundedSender<ClientCommand>,
    view: watch::Receiver<SessionView>,
}

impl GameClient {
    /// Joins a game over a WebSocket channel.
    #[cfg(feature = "websocket")]
    pub fn connect<S: StateStore, R: MoveRules>(
        store: S,
        rules: R,
        config: ClientConfig,
    ) -> Self {
        Self::connect_with(tempo_transport::WsDialer, store, rules, config)
    }

    /// Joins a game over a caller-supplied dialer. Tests use this with
    /// an in-memory transport.
    pub fn connect_with<D: Dialer, S: StateStore, R: MoveRules>(
        dialer: D,
        store: S,
        rules: R,
        config: ClientConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(SessionView {
            status: ConnStatus::Reconnecting,
            snapshot: None,
            clocks: None,
            last_error: None,
        });
        let (ply_tx, ply_rx) = watch::channel(0);

        let (conn, link_events) = ConnectionManager::spawn(
            dialer,
            ConnectOptions {
                base_url: config.base_url,
                game_id: config.game_id.clone(),
                token: config.token,
            },
            ply_rx,
        );

        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let actor = SessionActor {
            store: Arc::new(store),
            rules,
            game_id: config.game_id,
            conn,
            link_events,
            commands: cmd_rx,
            fetch_tx,
            fetch_rx,
            reconciler: Reconciler::new(),
            status: ConnStatus::Reconnecting,
            clock: None,
            ticker: ClockTicker::new(),
            ply_tx,
            view_tx,
            last_error: None,
        };
        tokio::spawn(actor.run());

        Self {
            commands: cmd_tx,
            view: view_rx,
        }
    }

    /// A watch on the session's observable state. `changed().await`
    /// then `borrow()` — the standard watch-channel dance.
    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Submits a move.
    ///
    /// On success the move has been applied optimistically and
    /// transmitted; the server's verdict arrives later through the
    /// view. Fails fast while disconnected — a move the user made
    /// against a stale board shouldn't be silently queued for minutes.
    pub async fn submit_move(&self, uci: impl Into<String>) -> Result<(), TempoError> {
        self.request(|reply| ClientCommand::SubmitMove {
            uci: uci.into(),
            reply,
        })
        .await
    }

    /// Resigns the game.
    pub async fn resign(&self) -> Result<(), TempoError> {
        self.request(|reply| ClientCommand::GameAction {
            kind: GameAction::Resign,
            reply,
        })
        .await
    }

    /// Offers the opponent a draw.
    pub async fn offer_draw(&self) -> Result<(), TempoError> {
        self.request(|reply| ClientCommand::GameAction {
            kind: GameAction::OfferDraw,
            reply,
        })
        .await
    }

    /// Accepts the opponent's outstanding draw offer.
    pub async fn accept_draw(&self) -> Result<(), TempoError> {
        self.request(|reply| ClientCommand::GameAction {
            kind: GameAction::AcceptDraw,
            reply,
        })
        .await
    }

    /// Leaves the game: closes the channel and stops the session task.
    /// Terminal — this handle (and its clones) can't be reused after.
    pub fn close(&self) {
        let _ = self.commands.send(ClientCommand::Close);
    }

    async fn request<F>(&self, make: F) -> Result<(), TempoError>
    where
        F: FnOnce(oneshot::Sender<Result<(), TempoError>>) -> ClientCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| closed())?;
        reply_rx.await.map_err(|_| closed())?
    }
}

fn closed() -> TempoError {
    TransportError::ConnectionClosed("session closed".into()).into()
}

// ---------------------------------------------------------------------------
// Actor internals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum GameAction {
    Resign,
    OfferDraw,
    AcceptDraw,
}

enum ClientCommand {
    SubmitMove {
        uci: String,
        reply: oneshot::Sender<Result<(), TempoError>>,
    },
    GameAction {
        kind: GameAction,
        reply: oneshot::Sender<Result<(), TempoError>>,
    },
    Close,
}

/// Result of a spawned refetch task.
struct FetchOutcome {
    ticket: FetchTicket,
    result: Result<GameSnapshot, SessionError>,
    fallback: Option<Fallback>,
}

struct SessionActor<S: StateStore, R: MoveRules> {
    store: Arc<S>,
    rules: R,
    game_id: GameId,
    conn: ConnectionHandle,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
    fetch_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    reconciler: Reconciler,
    status: ConnStatus,
    /// Anchored server clock values; replaced at every server-derived
    /// sync point, never by optimistic changes.
    clock: Option<ClockSnapshot>,
    ticker: ClockTicker,
    /// Feeds the connection manager's SYNC handshake.
    ply_tx: watch::Sender<u32>,
    view_tx: watch::Sender<SessionView>,
    last_error: Option<String>,
}

impl<S: StateStore, R: MoveRules> SessionActor<S, R> {
    async fn run(mut self) {
        info!(game_id = %self.game_id, "game session started");

        // Initial authoritative load. A failure here isn't fatal — the
        // SYNC handshake will push GAME_STATE once the channel opens.
        match self.store.fetch_state(&self.game_id).await {
            Ok(state) => {
                self.reconciler.replace(state);
                self.after_server_change();
            }
            Err(e) => {
                warn!(game_id = %self.game_id, error = %e, "initial load failed");
                self.last_error = Some(e.to_string());
                self.publish_view();
            }
        }

        enum Step {
            Cmd(Option<ClientCommand>),
            Link(Option<LinkEvent>),
            Fetch(FetchOutcome),
            Tick,
        }

        loop {
            let step = tokio::select! {
                cmd = self.commands.recv() => Step::Cmd(cmd),
                event = self.link_events.recv() => Step::Link(event),
                // fetch_tx lives in self, so this channel never yields None
                Some(outcome) = self.fetch_rx.recv() => Step::Fetch(outcome),
                _ = self.ticker.wait() => Step::Tick,
            };

            match step {
                Step::Cmd(None) | Step::Cmd(Some(ClientCommand::Close)) => {
                    self.conn.close();
                    self.status = ConnStatus::Disconnected;
                    self.ticker.stop();
                    self.publish_view();
                    break;
                }
                Step::Cmd(Some(ClientCommand::SubmitMove { uci, reply })) => {
                    let result = self.handle_submit(&uci);
                    let _ = reply.send(result);
                }
                Step::Cmd(Some(ClientCommand::GameAction { kind, reply })) => {
                    let result = self.handle_action(kind).await;
                    let _ = reply.send(result);
                }
                Step::Link(Some(LinkEvent::Status(status))) => {
                    debug!(game_id = %self.game_id, %status, "channel status");
                    self.status = status;
                    self.publish_view();
                }
                Step::Link(Some(LinkEvent::Frame(frame))) => {
                    self.handle_frame(&frame);
                }
                Step::Link(None) => {
                    // Manager task gone without an explicit close.
                    warn!(game_id = %self.game_id, "transport stopped");
                    self.status = ConnStatus::Disconnected;
                    self.ticker.stop();
                    self.publish_view();
                    break;
                }
                Step::Fetch(outcome) => {
                    let fetch_error =
                        outcome.result.as_ref().err().map(ToString::to_string);
                    let applied = self.reconciler.complete_refetch(
                        outcome.ticket,
                        outcome.result,
                        outcome.fallback,
                    );
                    if let Some(reason) = fetch_error {
                        self.last_error = Some(reason);
                        self.publish_view();
                    }
                    if applied {
                        self.after_server_change();
                    }
                }
                Step::Tick => {
                    self.publish_view();
                }
            }
        }

        info!(game_id = %self.game_id, "game session stopped");
    }

    // -- Commands ----------------------------------------------------------

    fn handle_submit(&mut self, uci: &str) -> Result<(), TempoError> {
        // Fail fast while the channel is down: the board the user moved
        // on may be arbitrarily stale.
        if self.status != ConnStatus::Connected {
            return Err(SessionError::Offline.into());
        }
        let correlation_id = mint_correlation_id();
        let frame = self.reconciler.submit(correlation_id, uci, &self.rules)?;
        if let Err(e) = self.conn.send(frame) {
            self.reconciler.rollback_pending();
            return Err(e.into());
        }
        self.after_local_change();
        Ok(())
    }

    async fn handle_action(&mut self, kind: GameAction) -> Result<(), TempoError> {
        let state = match kind {
            GameAction::Resign => self.store.resign(&self.game_id).await?,
            GameAction::OfferDraw => self.store.offer_draw(&self.game_id).await?,
            GameAction::AcceptDraw => self.store.accept_draw(&self.game_id).await?,
        };
        debug!(game_id = %self.game_id, ?kind, "game action applied");
        self.reconciler.replace(state);
        self.after_server_change();
        Ok(())
    }

    // -- Inbound frames ----------------------------------------------------

    fn handle_frame(&mut self, frame: &str) {
        let Some(msg) = decode_server_frame(frame) else {
            warn!(game_id = %self.game_id, "dropping unparseable frame");
            return;
        };
        debug!(game_id = %self.game_id, kind = msg.kind(), "server frame");

        match self.reconciler.handle_server(msg) {
            Action::None => self.after_server_change(),
            Action::Refetch { ticket, fallback } => {
                self.spawn_refetch(ticket, fallback);
            }
            Action::Reject { reason, ticket } => {
                self.last_error = Some(reason);
                self.spawn_refetch(ticket, None);
                self.after_server_change();
            }
        }
    }

    fn spawn_refetch(&self, ticket: FetchTicket, fallback: Option<Fallback>) {
        let store = Arc::clone(&self.store);
        let game_id = self.game_id.clone();
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = store.fetch_state(&game_id).await;
            let _ = tx.send(FetchOutcome {
                ticket,
                result,
                fallback,
            });
        });
    }

    // -- View bookkeeping --------------------------------------------------

    /// After a server-derived change: resync the ply watch, re-anchor
    /// the clock, publish.
    fn after_server_change(&mut self) {
        self.ply_tx.send_replace(self.reconciler.last_seen_ply());
        self.capture_clock();
        self.publish_view();
    }

    /// After an optimistic local change: the server hasn't charged
    /// anyone for the move yet, so the clock anchor stays put.
    fn after_local_change(&mut self) {
        self.ply_tx.send_replace(self.reconciler.last_seen_ply());
        self.publish_view();
    }

    fn capture_clock(&mut self) {
        let now = Instant::now();
        self.clock = self
            .reconciler
            .snapshot()
            .and_then(|s| ClockSnapshot::from_game(s, now));
        match &self.clock {
            Some(c) if c.running && c.side_to_move.is_some() => self.ticker.start(),
            _ => self.ticker.stop(),
        }
    }

    fn publish_view(&self) {
        let snapshot = self.reconciler.snapshot().cloned();
        let clocks = self
            .clock
            .map(|c| c.project(Instant::now()))
            .or_else(|| snapshot.as_ref().and_then(|s| s.clocks));
        self.view_tx.send_replace(SessionView {
            status: self.status,
            snapshot,
            clocks,
            last_error: self.last_error.clone(),
        });
    }
}
