//! Frame encoding and lenient decoding.
//!
//! Outbound frames are strict: the client controls them, so serde derive
//! does the job and any failure is a programming error surfaced as
//! [`ProtocolError::Encode`].
//!
//! Inbound frames are the opposite. The server evolves independently of
//! deployed clients, so the decoder never fails: every field coercion
//! defensively defaults or omits, unknown type tags become
//! [`ServerMessage::Unknown`], and a frame that isn't even a JSON object
//! with a string `type` decodes to `None` and is dropped with no
//! observable effect. That lossy tolerance is deliberate — a stray bad
//! frame must not take down a live game view.

use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{
    ClientMessage, ClockPair, Color, CorrelationId, GameFinishedFrame, GameId,
    GameStateFrame, GameStatus, MoveAcceptedFrame, MoveRecord,
    MoveRejectedFrame, PlayerId, ServerMessage,
};

/// Serializes an outbound frame to the wire text.
///
/// # Errors
/// Returns [`ProtocolError::Encode`] if serialization fails — which for
/// these types means a bug, not bad input.
pub fn encode_client_frame(msg: &ClientMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

/// Decodes a raw inbound frame into a typed server message.
///
/// Returns `None` only when the frame cannot be interpreted as a tagged
/// message at all (invalid JSON, non-object, missing/non-string `type`).
/// Everything else decodes — possibly to [`ServerMessage::Unknown`].
pub fn decode_server_frame(raw: &str) -> Option<ServerMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let obj = value.as_object()?;
    let tag = obj.get("type")?.as_str()?.to_owned();

    let msg = match tag.as_str() {
        "GAME_STATE" => ServerMessage::GameState(decode_game_state(obj)),
        "MOVE_ACCEPTED" => ServerMessage::MoveAccepted(decode_move_accepted(obj)),
        "MOVE_REJECTED" => ServerMessage::MoveRejected(MoveRejectedFrame {
            game_id: GameId(coerce_string(obj.get("gameId"))),
            client_move_id: opt_string(obj.get("clientMoveId")).map(CorrelationId),
            reason: coerce_string(obj.get("reason")),
        }),
        "GAME_FINISHED" => ServerMessage::GameFinished(GameFinishedFrame {
            game_id: GameId(coerce_string(obj.get("gameId"))),
            result: coerce_string(obj.get("result")),
            reason: coerce_string(obj.get("reason")),
        }),
        _ => ServerMessage::Unknown {
            raw_type: tag,
            raw: value.clone(),
        },
    };
    Some(msg)
}

fn decode_game_state(obj: &serde_json::Map<String, Value>) -> GameStateFrame {
    let moves = obj.get("moves").and_then(Value::as_array).map(|entries| {
        entries
            .iter()
            .filter_map(Value::as_object)
            .map(|m| MoveRecord {
                ply: opt_u64(m.get("ply")).unwrap_or(0) as u32,
                uci: coerce_string(m.get("uci")),
                san: opt_string(m.get("san")),
                fen_after: opt_string(m.get("fenAfter")),
            })
            .collect()
    });

    GameStateFrame {
        game_id: GameId(coerce_string(obj.get("gameId"))),
        white_id: PlayerId(coerce_string(obj.get("whiteId"))),
        black_id: PlayerId(coerce_string(obj.get("blackId"))),
        fen: coerce_string(obj.get("fen")),
        moves,
        clocks: decode_clocks(obj.get("clocks")),
        status: opt_string(obj.get("status"))
            .and_then(|s| GameStatus::from_wire(&s)),
        side_to_move: opt_string(obj.get("sideToMove"))
            .and_then(|s| Color::from_wire(&s)),
        draw_offered_by: opt_string(obj.get("drawOfferedBy")).map(PlayerId),
    }
}

fn decode_move_accepted(obj: &serde_json::Map<String, Value>) -> MoveAcceptedFrame {
    MoveAcceptedFrame {
        game_id: GameId(coerce_string(obj.get("gameId"))),
        client_move_id: opt_string(obj.get("clientMoveId")).map(CorrelationId),
        ply: opt_u64(obj.get("ply")).map(|p| p as u32),
        fen: coerce_string(obj.get("fen")),
        clocks: decode_clocks(obj.get("clocks")),
    }
}

/// A clocks object counts only when both sides are present and numeric;
/// a half-formed one is treated as absent so a stale-but-complete value
/// is never mixed with a fresh partial one.
fn decode_clocks(value: Option<&Value>) -> Option<ClockPair> {
    let obj = value?.as_object()?;
    Some(ClockPair {
        white_ms: opt_u64(obj.get("whiteMs"))?,
        black_ms: opt_u64(obj.get("blackMs"))?,
    })
}

/// Coerces any present scalar to a string, defaulting to `""`.
fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// A string-ish field that may legitimately be absent. `null`, missing,
/// and non-scalar values all mean "absent".
fn opt_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// A non-negative integer that may arrive as a JSON number or a numeric
/// string. Fractional and negative values are rejected (omitted).
fn opt_u64(value: Option<&Value>) -> Option<u64> {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The decoder's contract is "never raise, always degrade": these
    //! tests exercise both well-formed frames and the malformed shapes a
    //! live server has actually produced (numbers as strings, nulls,
    //! half-filled clock objects).

    use super::*;

    // =====================================================================
    // Structural rejection — the only frames that decode to None
    // =====================================================================

    #[test]
    fn test_decode_invalid_json_returns_none() {
        assert_eq!(decode_server_frame("not json at all"), None);
    }

    #[test]
    fn test_decode_non_object_returns_none() {
        assert_eq!(decode_server_frame("[1, 2, 3]"), None);
        assert_eq!(decode_server_frame("\"hello\""), None);
        assert_eq!(decode_server_frame("42"), None);
    }

    #[test]
    fn test_decode_missing_type_returns_none() {
        assert_eq!(decode_server_frame(r#"{"gameId": "g1"}"#), None);
    }

    #[test]
    fn test_decode_non_string_type_returns_none() {
        assert_eq!(decode_server_frame(r#"{"type": 7}"#), None);
    }

    // =====================================================================
    // Unknown tags — forward compatibility
    // =====================================================================

    #[test]
    fn test_decode_unknown_tag_preserves_payload() {
        let msg =
            decode_server_frame(r#"{"type": "CHAT", "text": "hi"}"#).unwrap();
        match msg {
            ServerMessage::Unknown { raw_type, raw } => {
                assert_eq!(raw_type, "CHAT");
                assert_eq!(raw["text"], "hi");
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    // =====================================================================
    // GAME_STATE
    // =====================================================================

    #[test]
    fn test_decode_game_state_full() {
        let raw = r#"{
            "type": "GAME_STATE",
            "gameId": "g1",
            "whiteId": "pw",
            "blackId": "pb",
            "fen": "some-fen",
            "moves": [
                {"ply": 1, "uci": "e2e4", "san": "e4"},
                {"ply": 2, "uci": "e7e5"}
            ],
            "clocks": {"whiteMs": 60000, "blackMs": 59000},
            "status": "RUNNING",
            "sideToMove": "WHITE",
            "drawOfferedBy": "pb"
        }"#;
        let ServerMessage::GameState(frame) = decode_server_frame(raw).unwrap()
        else {
            panic!("expected GameState");
        };

        assert_eq!(frame.game_id, GameId("g1".into()));
        assert_eq!(frame.fen, "some-fen");
        let moves = frame.moves.unwrap();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].san.as_deref(), Some("e4"));
        assert_eq!(moves[1].san, None);
        assert_eq!(
            frame.clocks,
            Some(ClockPair {
                white_ms: 60_000,
                black_ms: 59_000
            })
        );
        assert_eq!(frame.status, Some(GameStatus::Running));
        assert_eq!(frame.side_to_move, Some(Color::White));
        assert_eq!(frame.draw_offered_by, Some(PlayerId("pb".into())));
    }

    #[test]
    fn test_decode_game_state_minimal_defaults() {
        // Only the tag present — every field defaults rather than fails.
        let ServerMessage::GameState(frame) =
            decode_server_frame(r#"{"type": "GAME_STATE"}"#).unwrap()
        else {
            panic!("expected GameState");
        };

        assert_eq!(frame.game_id, GameId(String::new()));
        assert_eq!(frame.fen, "");
        assert!(frame.moves.is_none());
        assert!(frame.clocks.is_none());
        assert!(frame.status.is_none());
        assert!(frame.side_to_move.is_none());
    }

    #[test]
    fn test_decode_game_state_skips_malformed_move_entries() {
        let raw = r#"{
            "type": "GAME_STATE",
            "gameId": "g1", "whiteId": "w", "blackId": "b", "fen": "f",
            "moves": [{"ply": 1, "uci": "e2e4"}, "garbage", 42, {"uci": "d2d4"}]
        }"#;
        let ServerMessage::GameState(frame) = decode_server_frame(raw).unwrap()
        else {
            panic!("expected GameState");
        };

        let moves = frame.moves.unwrap();
        // Non-object entries dropped; the object missing `ply` defaults to 0.
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].uci, "e2e4");
        assert_eq!(moves[1].ply, 0);
        assert_eq!(moves[1].uci, "d2d4");
    }

    #[test]
    fn test_decode_half_formed_clocks_treated_as_absent() {
        let raw = r#"{
            "type": "GAME_STATE",
            "gameId": "g1", "whiteId": "w", "blackId": "b", "fen": "f",
            "clocks": {"whiteMs": 60000}
        }"#;
        let ServerMessage::GameState(frame) = decode_server_frame(raw).unwrap()
        else {
            panic!("expected GameState");
        };
        assert!(frame.clocks.is_none());
    }

    #[test]
    fn test_decode_numeric_string_clocks_coerce() {
        let raw = r#"{
            "type": "GAME_STATE",
            "gameId": "g1", "whiteId": "w", "blackId": "b", "fen": "f",
            "clocks": {"whiteMs": "60000", "blackMs": "45000"}
        }"#;
        let ServerMessage::GameState(frame) = decode_server_frame(raw).unwrap()
        else {
            panic!("expected GameState");
        };
        assert_eq!(
            frame.clocks,
            Some(ClockPair {
                white_ms: 60_000,
                black_ms: 45_000
            })
        );
    }

    #[test]
    fn test_decode_unrecognized_status_omitted() {
        let raw = r#"{
            "type": "GAME_STATE",
            "gameId": "g1", "whiteId": "w", "blackId": "b", "fen": "f",
            "status": "PAUSED", "sideToMove": "GREEN"
        }"#;
        let ServerMessage::GameState(frame) = decode_server_frame(raw).unwrap()
        else {
            panic!("expected GameState");
        };
        assert!(frame.status.is_none());
        assert!(frame.side_to_move.is_none());
    }

    // =====================================================================
    // MOVE_ACCEPTED
    // =====================================================================

    #[test]
    fn test_decode_move_accepted_with_correlation_id() {
        let raw = r#"{
            "type": "MOVE_ACCEPTED",
            "gameId": "g1",
            "clientMoveId": "cafebabe",
            "ply": 3,
            "fen": "after-fen",
            "clocks": {"whiteMs": 58000, "blackMs": 60000}
        }"#;
        let ServerMessage::MoveAccepted(frame) =
            decode_server_frame(raw).unwrap()
        else {
            panic!("expected MoveAccepted");
        };

        assert_eq!(frame.client_move_id, Some(CorrelationId("cafebabe".into())));
        assert_eq!(frame.ply, Some(3));
        assert_eq!(frame.fen, "after-fen");
    }

    #[test]
    fn test_decode_move_accepted_null_correlation_id_is_absent() {
        let raw = r#"{
            "type": "MOVE_ACCEPTED",
            "gameId": "g1",
            "clientMoveId": null,
            "fen": "after-fen"
        }"#;
        let ServerMessage::MoveAccepted(frame) =
            decode_server_frame(raw).unwrap()
        else {
            panic!("expected MoveAccepted");
        };

        assert_eq!(frame.client_move_id, None);
        assert_eq!(frame.ply, None);
        assert!(frame.clocks.is_none());
    }

    // =====================================================================
    // MOVE_REJECTED / GAME_FINISHED
    // =====================================================================

    #[test]
    fn test_decode_move_rejected() {
        let raw = r#"{
            "type": "MOVE_REJECTED",
            "gameId": "g1",
            "clientMoveId": "cafebabe",
            "reason": "not your turn"
        }"#;
        let ServerMessage::MoveRejected(frame) =
            decode_server_frame(raw).unwrap()
        else {
            panic!("expected MoveRejected");
        };

        assert_eq!(frame.client_move_id, Some(CorrelationId("cafebabe".into())));
        assert_eq!(frame.reason, "not your turn");
    }

    #[test]
    fn test_decode_move_rejected_missing_reason_defaults_empty() {
        let ServerMessage::MoveRejected(frame) = decode_server_frame(
            r#"{"type": "MOVE_REJECTED", "gameId": "g1"}"#,
        )
        .unwrap() else {
            panic!("expected MoveRejected");
        };
        assert_eq!(frame.reason, "");
    }

    #[test]
    fn test_decode_game_finished() {
        let raw = r#"{
            "type": "GAME_FINISHED",
            "gameId": "g1",
            "result": "WHITE_WON",
            "reason": "CHECKMATE"
        }"#;
        let ServerMessage::GameFinished(frame) =
            decode_server_frame(raw).unwrap()
        else {
            panic!("expected GameFinished");
        };

        assert_eq!(frame.result, "WHITE_WON");
        assert_eq!(frame.reason, "CHECKMATE");
    }

    // =====================================================================
    // Encoding
    // =====================================================================

    #[test]
    fn test_encode_move_frame_round_trips_through_value() {
        let msg = ClientMessage::Move {
            game_id: GameId("g1".into()),
            client_move_id: CorrelationId("id-1".into()),
            uci: "g1f3".into(),
        };
        let text = encode_client_frame(&msg).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "MOVE");
        assert_eq!(value["uci"], "g1f3");
    }
}
