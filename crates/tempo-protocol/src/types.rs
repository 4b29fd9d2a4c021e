//! Core types for the Tempo wire dialect.
//!
//! Everything in this module either travels on the wire (frames, ids,
//! clocks) or is the client's typed view of what the server sent back
//! (the [`GameSnapshot`]). The shapes mirror the game service's JSON:
//! flat objects tagged by a `"type"` string, camelCase field names,
//! UUID-string identifiers.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a game session.
///
/// The service issues these as UUID strings, so the newtype wraps a
/// `String` rather than an integer. Wrapping it still buys the usual
/// type safety: you can't pass a `PlayerId` where a `GameId` belongs.
///
/// `#[serde(transparent)]` makes it serialize as the bare string, not
/// as `{ "0": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game-{}", self.0)
    }
}

/// A unique identifier for a player, issued by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

/// A client-generated token attached to a submitted move so the server's
/// eventual response can be matched back to the local pending action.
///
/// The client mints one per move attempt (see `tempo-session`); the
/// server echoes it back in `MOVE_ACCEPTED` / `MOVE_REJECTED` as
/// `clientMoveId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "move-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Game-domain types
// ---------------------------------------------------------------------------

/// Which side a player controls / which side is to move.
///
/// Wire strings are uppercase (`"WHITE"` / `"BLACK"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The opposing side.
    pub fn other(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Parses the wire spelling, case-insensitively. Unrecognized values
    /// yield `None` — the decoder defaults rather than fails.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "WHITE" => Some(Self::White),
            "BLACK" => Some(Self::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "WHITE"),
            Self::Black => write!(f, "BLACK"),
        }
    }
}

/// Lifecycle status of a game.
///
/// The clock projector only runs while the game is `Running`; a
/// `Finished` game freezes both displayed clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Running,
    Finished,
}

impl GameStatus {
    /// Parses the wire spelling, case-insensitively.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RUNNING" => Some(Self::Running),
            "FINISHED" => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Remaining time per side, in milliseconds.
///
/// This is the server-confirmed value at some sync instant — the live
/// countdown shown to the user is derived from it by `tempo-clock`,
/// never stored back into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockPair {
    pub white_ms: u64,
    pub black_ms: u64,
}

impl ClockPair {
    /// Remaining time for the given side.
    pub fn for_side(&self, side: Color) -> u64 {
        match side {
            Color::White => self.white_ms,
            Color::Black => self.black_ms,
        }
    }
}

/// One applied half-move in the game's move sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// 1-based half-move number.
    pub ply: u32,
    /// The move in engine (UCI) notation, e.g. `"e2e4"`.
    pub uci: String,
    /// Human-readable (SAN) notation, when the producer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub san: Option<String>,
    /// Position after the move, when the producer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fen_after: Option<String>,
}

// ---------------------------------------------------------------------------
// GameSnapshot — the client's local view of one game
// ---------------------------------------------------------------------------

/// The full local view of a game, replaced wholesale on every resync.
///
/// This is the shape the REST collaborator returns from
/// `GET /v1/games/{id}/state` and the shape a `GAME_STATE` push converts
/// into. Apart from the two partial-merge cases owned by the
/// reconciliation engine (move confirmation, game finish), it is never
/// mutated field-by-field from untrusted data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub white_id: PlayerId,
    pub black_id: PlayerId,
    /// Authoritative board encoding (FEN).
    pub fen: String,
    #[serde(default)]
    pub moves: Vec<MoveRecord>,
    #[serde(default)]
    pub clocks: Option<ClockPair>,
    #[serde(default)]
    pub status: Option<GameStatus>,
    #[serde(default)]
    pub side_to_move: Option<Color>,
    /// Player with an outstanding draw offer, if any.
    #[serde(default)]
    pub draw_offered_by: Option<PlayerId>,
    /// Terminal result, populated once the game is finished.
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl GameSnapshot {
    /// Highest ply the client has observed, for the SYNC handshake.
    ///
    /// Omitted ply numbers decode to 0, so the move-list length serves
    /// as the floor — a server that never numbers its moves still gets
    /// an accurate SYNC. 0 means "nothing seen yet".
    pub fn last_seen_ply(&self) -> u32 {
        let max_ply = self.moves.iter().map(|m| m.ply).max().unwrap_or(0);
        max_ply.max(self.moves.len() as u32)
    }

    /// Whether the game is live (clocks running, moves allowed).
    pub fn is_running(&self) -> bool {
        self.status == Some(GameStatus::Running)
    }
}

// ---------------------------------------------------------------------------
// Inbound frames (server → client)
// ---------------------------------------------------------------------------

/// Payload of a `GAME_STATE` push: a full authoritative snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct GameStateFrame {
    pub game_id: GameId,
    pub white_id: PlayerId,
    pub black_id: PlayerId,
    pub fen: String,
    pub moves: Option<Vec<MoveRecord>>,
    pub clocks: Option<ClockPair>,
    pub status: Option<GameStatus>,
    pub side_to_move: Option<Color>,
    pub draw_offered_by: Option<PlayerId>,
}

impl GameStateFrame {
    /// Converts the push into a wholesale replacement snapshot.
    ///
    /// A push never carries a terminal result — that arrives through
    /// `GAME_FINISHED` — so `result`/`finish_reason` start empty.
    pub fn into_snapshot(self) -> GameSnapshot {
        GameSnapshot {
            game_id: self.game_id,
            white_id: self.white_id,
            black_id: self.black_id,
            fen: self.fen,
            moves: self.moves.unwrap_or_default(),
            clocks: self.clocks,
            status: self.status,
            side_to_move: self.side_to_move,
            draw_offered_by: self.draw_offered_by,
            result: None,
            finish_reason: None,
        }
    }
}

/// Payload of a `MOVE_ACCEPTED` push.
///
/// `client_move_id` is present when this confirms the receiver's own
/// move; absent for the opponent's moves and SYNC replays. The
/// reconciliation engine branches on exactly that distinction.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveAcceptedFrame {
    pub game_id: GameId,
    pub client_move_id: Option<CorrelationId>,
    pub ply: Option<u32>,
    pub fen: String,
    pub clocks: Option<ClockPair>,
}

/// Payload of a `MOVE_REJECTED` push: the optimistic local move must be
/// rolled back (by refetching authoritative truth).
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRejectedFrame {
    pub game_id: GameId,
    pub client_move_id: Option<CorrelationId>,
    pub reason: String,
}

/// Payload of a `GAME_FINISHED` push: terminal, merged in place without
/// touching position or move list.
#[derive(Debug, Clone, PartialEq)]
pub struct GameFinishedFrame {
    pub game_id: GameId,
    pub result: String,
    pub reason: String,
}

/// A decoded inbound frame.
///
/// The decoder (`decode_server_frame`) produces exactly one of these for
/// every structurally-valid JSON object frame. Unknown type tags land in
/// [`ServerMessage::Unknown`] so new server message kinds never crash an
/// old client — they're logged and ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    GameState(GameStateFrame),
    MoveAccepted(MoveAcceptedFrame),
    MoveRejected(MoveRejectedFrame),
    GameFinished(GameFinishedFrame),
    /// Forward-compatibility placeholder: the tag was a string we don't
    /// recognize. Carries the claimed tag and the original payload.
    Unknown {
        raw_type: String,
        raw: serde_json::Value,
    },
}

impl ServerMessage {
    /// Short tag for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::GameState(_) => "GAME_STATE",
            Self::MoveAccepted(_) => "MOVE_ACCEPTED",
            Self::MoveRejected(_) => "MOVE_REJECTED",
            Self::GameFinished(_) => "GAME_FINISHED",
            Self::Unknown { .. } => "UNKNOWN",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound frames (client → server)
// ---------------------------------------------------------------------------

/// A frame the client sends to the server.
///
/// `#[serde(tag = "type")]` produces the service's internally tagged
/// shape: `{ "type": "MOVE", "gameId": ..., ... }`. Variant-level
/// `rename` pins the exact uppercase tags the service expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// One local move attempt. Sent exactly once per attempt — never
    /// retried under a reused correlation id.
    #[serde(rename = "MOVE", rename_all = "camelCase")]
    Move {
        game_id: GameId,
        client_move_id: CorrelationId,
        uci: String,
    },

    /// Resynchronization handshake, sent after every successful
    /// (re)connect. `last_seen_ply` tells the server what the client
    /// already has so it can replay or confirm anything missed.
    #[serde(rename = "SYNC", rename_all = "camelCase")]
    Sync { game_id: GameId, last_seen_ply: u32 },
}

// =========================================================================
// Tests
// =========================================================================
