//! A complete match against an in-process mock game service.
//!
//! Starts a tiny WebSocket "server" that accepts every move and charges
//! three seconds per ply, then drives a [`GameClient`] through a short
//! opening, a draw offer, and a resignation. Everything runs over a
//! real loopback socket so the full stack — connection manager, codec,
//! reconciler, clock projection — is exercised.
//!
//! ```text
//! RUST_LOG=debug cargo run -p local-match
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tempo::prelude::*;
use tempo_protocol::GameStatus;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const MS_PER_PLY: u64 = 3_000;

/// The mock service's authoritative game record, shared between its
/// WebSocket side and its "REST" side.
struct ServiceGame {
    state: GameSnapshot,
}

impl ServiceGame {
    fn new() -> Self {
        let state = serde_json::from_str(&format!(
            r#"{{
                "gameId": "demo",
                "whiteId": "you",
                "blackId": "them",
                "fen": "{START_FEN}",
                "moves": [],
                "clocks": {{"whiteMs": 180000, "blackMs": 180000}},
                "status": "RUNNING",
                "sideToMove": "WHITE"
            }}"#
        ))
        .expect("static game json");
        Self { state }
    }

    /// Accepts a move unconditionally: appends it, charges the mover,
    /// flips the turn.
    fn apply_move(&mut self, uci: &str) -> (u32, String, ClockPair) {
        let ply = self.state.last_seen_ply() + 1;
        let fen = format!("{START_FEN}#{ply}");
        self.state.fen = fen.clone();
        self.state.moves.push(serde_json::from_value(serde_json::json!({
            "ply": ply,
            "uci": uci,
        })).expect("move record"));

        let clocks = self.state.clocks.get_or_insert(ClockPair {
            white_ms: 180_000,
            black_ms: 180_000,
        });
        match self.state.side_to_move.unwrap_or(Color::White) {
            Color::White => clocks.white_ms = clocks.white_ms.saturating_sub(MS_PER_PLY),
            Color::Black => clocks.black_ms = clocks.black_ms.saturating_sub(MS_PER_PLY),
        }
        self.state.side_to_move = self.state.side_to_move.map(|c| c.other());
        (ply, fen, *clocks)
    }
}

/// In-process stand-in for the game service's REST surface.
#[derive(Clone)]
struct ServiceStore {
    game: Arc<Mutex<ServiceGame>>,
}

impl StateStore for ServiceStore {
    async fn fetch_state(&self, _game_id: &GameId) -> Result<GameSnapshot, SessionError> {
        Ok(self.game.lock().unwrap().state.clone())
    }

    async fn resign(&self, _game_id: &GameId) -> Result<GameSnapshot, SessionError> {
        let mut game = self.game.lock().unwrap();
        game.state.status = Some(GameStatus::Finished);
        game.state.result = Some("0-1".into());
        game.state.finish_reason = Some("resignation".into());
        Ok(game.state.clone())
    }

    async fn offer_draw(&self, _game_id: &GameId) -> Result<GameSnapshot, SessionError> {
        let mut game = self.game.lock().unwrap();
        let offerer = game.state.white_id.clone();
        game.state.draw_offered_by = Some(offerer);
        Ok(game.state.clone())
    }

    async fn accept_draw(&self, _game_id: &GameId) -> Result<GameSnapshot, SessionError> {
        let mut game = self.game.lock().unwrap();
        game.state.status = Some(GameStatus::Finished);
        game.state.result = Some("1/2-1/2".into());
        game.state.finish_reason = Some("draw agreed".into());
        Ok(game.state.clone())
    }
}

/// Serves the WebSocket side: answers SYNC with GAME_STATE and every
/// MOVE with a correlated MOVE_ACCEPTED.
async fn serve(listener: TcpListener, game: Arc<Mutex<ServiceGame>>) {
    loop {
        let Ok((stream, peer)) = listener.accept().await else {
            return;
        };
        info!(%peer, "service: client connected");
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            continue;
        };

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let Ok(frame) = serde_json::from_str::<serde_json::Value>(text.as_str())
            else {
                continue;
            };

            match frame["type"].as_str() {
                Some("SYNC") => {
                    let state = game.lock().unwrap().state.clone();
                    let mut reply = serde_json::to_value(&state).expect("state json");
                    reply["type"] = "GAME_STATE".into();
                    let _ = ws.send(Message::Text(reply.to_string().into())).await;
                }
                Some("MOVE") => {
                    let uci = frame["uci"].as_str().unwrap_or_default().to_owned();
                    let (ply, fen, clocks) =
                        game.lock().unwrap().apply_move(&uci);
                    let reply = serde_json::json!({
                        "type": "MOVE_ACCEPTED",
                        "gameId": "demo",
                        "clientMoveId": frame["clientMoveId"],
                        "ply": ply,
                        "fen": fen,
                        "clocks": {
                            "whiteMs": clocks.white_ms,
                            "blackMs": clocks.black_ms,
                        },
                    });
                    let _ = ws.send(Message::Text(reply.to_string().into())).await;
                }
                _ => {}
            }
        }
        info!("service: client disconnected");
    }
}

fn show(view: &SessionView) {
    let Some(snapshot) = &view.snapshot else {
        info!(status = %view.status, "no state yet");
        return;
    };
    let clocks = view.clocks.unwrap_or(ClockPair {
        white_ms: 0,
        black_ms: 0,
    });
    info!(
        status = %view.status,
        plies = snapshot.moves.len(),
        white = %format_ms(clocks.white_ms),
        black = %format_ms(clocks.black_ms),
        "board update"
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let game = Arc::new(Mutex::new(ServiceGame::new()));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(serve(listener, Arc::clone(&game)));
    info!(%addr, "mock game service listening");

    let client = GameClient::connect(
        ServiceStore {
            game: Arc::clone(&game),
        },
        UncheckedRules,
        ClientConfig {
            base_url: format!("ws://{addr}"),
            game_id: GameId("demo".into()),
            token: "demo-token".into(),
        },
    );
    let mut view = client.view();

    // Wait for the channel to open.
    while view.borrow().status != ConnStatus::Connected {
        view.changed().await?;
    }
    show(&view.borrow());

    // A short opening, one move per second so the clock projection is
    // visible between confirmations.
    for uci in ["e2e4", "e7e5", "g1f3", "b8c6"] {
        client.submit_move(uci).await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        show(&view.borrow());
    }

    info!("offering a draw");
    client.offer_draw().await?;
    show(&view.borrow());

    info!("no takers; resigning instead");
    client.resign().await?;
    let final_view = view.borrow().clone();
    show(&final_view);
    if let Some(snapshot) = final_view.snapshot {
        info!(
            result = snapshot.result.as_deref().unwrap_or("?"),
            reason = snapshot.finish_reason.as_deref().unwrap_or("?"),
            "game over"
        );
    }

    client.close();
    Ok(())
}
