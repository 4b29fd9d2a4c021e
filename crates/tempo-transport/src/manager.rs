//! The connection manager: owns exactly one live channel per game
//! session and hides every network hiccup behind it.
//!
//! The manager runs as a single Tokio task driving this state machine:
//!
//! ```text
//!   connecting ──(open)──→ connected ──(drop/error)──→ reconnecting
//!       ↑                      │                            │
//!       └──────(backoff delay elapsed)─────────────────────┘
//!
//!   any state ──(explicit close)──→ disconnected   (terminal)
//! ```
//!
//! On every successful open it (a) resets the attempt counter,
//! (b) flushes the outbound queue in FIFO order, then (c) sends a SYNC
//! frame carrying the last ply the session has observed, so the server
//! can replay anything missed. Reconnection is perpetual — there is no
//! retry cap — and only an explicit [`ConnectionHandle::close`] stops
//! it. Messages submitted while the channel is down are queued, never
//! dropped; the queue is discarded only on explicit close.

use std::collections::VecDeque;

use tempo_protocol::{encode_client_frame, ClientMessage, GameId};
use tokio::sync::{mpsc, watch};

use crate::{backoff, ConnStatus, Dialer, Link, TransportError};

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Base URL of the realtime endpoint, e.g. `ws://host:port`.
    pub base_url: String,
    /// The game this channel is scoped to.
    pub game_id: GameId,
    /// Caller credential, injected at connect time by the auth
    /// collaborator. Opaque to this layer.
    pub token: String,
}

impl ConnectOptions {
    /// The per-game channel URL.
    fn url(&self) -> String {
        format!(
            "{}/ws/game/{}?token={}",
            self.base_url.trim_end_matches('/'),
            self.game_id.0,
            self.token
        )
    }
}

/// An event emitted by the manager to the session orchestrator.
#[derive(Debug)]
pub enum LinkEvent {
    /// Advisory status transition.
    Status(ConnStatus),
    /// A raw inbound text frame, undecoded.
    Frame(String),
}

/// Commands accepted by the manager task.
enum Command {
    Send(ClientMessage),
    Close,
}

/// Handle to a running connection manager. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ConnectionHandle {
    /// Transmits a message immediately if the channel is open, otherwise
    /// enqueues it for the next successful (re)connect.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] if the manager has
    /// already shut down (explicit close happened).
    pub fn send(&self, msg: ClientMessage) -> Result<(), TransportError> {
        self.commands.send(Command::Send(msg)).map_err(|_| {
            TransportError::ConnectionClosed("manager stopped".into())
        })
    }

    /// Intentional teardown. Terminal: the pending backoff timer (if
    /// any) is cancelled, the queue is discarded, and no further
    /// reconnect attempts occur. The disconnected status is reported
    /// immediately, without waiting for socket teardown.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

// ---------------------------------------------------------------------------
// Manager task
// ---------------------------------------------------------------------------

/// Why the connected phase ended.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    /// Explicit close — the manager must stop for good.
    Closed,
    /// The channel dropped without intent — schedule a reconnect.
    Lost,
}

/// Owns the channel, the outbound queue, and the retry state for one
/// game session.
pub struct ConnectionManager<D: Dialer> {
    dialer: D,
    opts: ConnectOptions,
    /// Last ply the session has observed, read at each (re)connect for
    /// the SYNC handshake. The session orchestrator owns the sender.
    last_seen_ply: watch::Receiver<u32>,
    events: mpsc::UnboundedSender<LinkEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Not-yet-sent messages, FIFO. Only populated while the channel is
    /// down; flushed in order before the SYNC frame on reopen.
    queue: VecDeque<ClientMessage>,
    /// Incremented on every close-without-intent, reset on open.
    attempt: u32,
}

impl<D: Dialer> ConnectionManager<D> {
    /// Spawns the manager task for one game session.
    ///
    /// Returns the command handle and the event stream the session
    /// orchestrator consumes.
    pub fn spawn(
        dialer: D,
        opts: ConnectOptions,
        last_seen_ply: watch::Receiver<u32>,
    ) -> (ConnectionHandle, mpsc::UnboundedReceiver<LinkEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let manager = Self {
            dialer,
            opts,
            last_seen_ply,
            events: event_tx,
            commands: cmd_rx,
            queue: VecDeque::new(),
            attempt: 0,
        };
        tokio::spawn(manager.run());

        (ConnectionHandle { commands: cmd_tx }, event_rx)
    }

    async fn run(mut self) {
        let url = self.opts.url();
        tracing::info!(game_id = %self.opts.game_id, "connection manager started");

        loop {
            match self.dialer.dial(&url).await {
                Ok(link) => {
                    if self.established(link).await == Exit::Closed {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        game_id = %self.opts.game_id,
                        attempt = self.attempt,
                        error = %e,
                        "dial failed"
                    );
                }
            }

            // Channel lost (or never opened): schedule the next attempt.
            self.emit(LinkEvent::Status(ConnStatus::Reconnecting));
            let delay = backoff::delay_for_attempt(self.attempt);
            self.attempt += 1;
            tracing::info!(
                game_id = %self.opts.game_id,
                attempt = self.attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );
            if self.wait_backoff(delay).await == Exit::Closed {
                break;
            }
        }

        tracing::info!(game_id = %self.opts.game_id, "connection manager stopped");
    }

    /// Drives one established channel until it drops or the session
    /// closes.
    async fn established(&mut self, mut link: D::Link) -> Exit {
        self.attempt = 0;
        self.emit(LinkEvent::Status(ConnStatus::Connected));

        // Flush queued messages in submission order, before SYNC.
        while let Some(msg) = self.queue.pop_front() {
            if let Err(e) = send_frame(&mut link, &msg).await {
                tracing::warn!(error = %e, "queue flush interrupted");
                self.queue.push_front(msg);
                return Exit::Lost;
            }
        }

        // Resynchronization handshake. Not queued on failure: a fresh
        // SYNC with a fresh ply is generated on the next open anyway.
        let sync = ClientMessage::Sync {
            game_id: self.opts.game_id.clone(),
            last_seen_ply: *self.last_seen_ply.borrow(),
        };
        if let Err(e) = send_frame(&mut link, &sync).await {
            tracing::warn!(error = %e, "sync handshake failed");
            return Exit::Lost;
        }

        // The arms are collected into a step first so the link can be
        // used mutably in the handling code below the select.
        enum Step {
            Cmd(Option<Command>),
            Inbound(Result<Option<String>, TransportError>),
        }

        loop {
            let step = tokio::select! {
                cmd = self.commands.recv() => Step::Cmd(cmd),
                inbound = link.recv() => Step::Inbound(inbound),
            };

            match step {
                // Handle dropped counts as close: the session is gone.
                Step::Cmd(None) | Step::Cmd(Some(Command::Close)) => {
                    self.emit(LinkEvent::Status(ConnStatus::Disconnected));
                    let _ = link.close().await;
                    return Exit::Closed;
                }
                Step::Cmd(Some(Command::Send(msg))) => {
                    if let Err(e) = send_frame(&mut link, &msg).await {
                        tracing::warn!(error = %e, "send failed, requeueing");
                        self.queue.push_back(msg);
                        return Exit::Lost;
                    }
                }
                Step::Inbound(Ok(Some(frame))) => {
                    self.emit(LinkEvent::Frame(frame));
                }
                Step::Inbound(Ok(None)) => {
                    tracing::info!(
                        game_id = %self.opts.game_id,
                        "channel closed by peer"
                    );
                    return Exit::Lost;
                }
                Step::Inbound(Err(e)) => {
                    tracing::warn!(error = %e, "channel error");
                    return Exit::Lost;
                }
            }
        }
    }

    /// Sleeps out the backoff delay while still accepting commands:
    /// sends enqueue, close cancels the timer and stops the manager.
    async fn wait_backoff(&mut self, delay: std::time::Duration) -> Exit {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Exit::Lost,
                cmd = self.commands.recv() => match cmd {
                    None | Some(Command::Close) => {
                        self.emit(LinkEvent::Status(ConnStatus::Disconnected));
                        return Exit::Closed;
                    }
                    Some(Command::Send(msg)) => {
                        tracing::debug!("queueing message while disconnected");
                        self.queue.push_back(msg);
                    }
                },
            }
        }
    }

    fn emit(&self, event: LinkEvent) {
        // The session may already have dropped its receiver during
        // teardown; nothing to do then.
        let _ = self.events.send(event);
    }
}

async fn send_frame<L: Link>(
    link: &mut L,
    msg: &ClientMessage,
) -> Result<(), TransportError> {
    let frame = encode_client_frame(msg).map_err(|e| {
        TransportError::SendFailed(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e,
        ))
    })?;
    link.send(&frame).await
}

// =========================================================================
// Tests
// =========================================================================
