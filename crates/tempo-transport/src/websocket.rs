//! WebSocket transport implementation using `tokio-tungstenite`.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::{Dialer, Link, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A [`Dialer`] that opens client WebSocket connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsDialer;

impl Dialer for WsDialer {
    type Link = WsLink;

    async fn dial(&self, url: &str) -> Result<Self::Link, TransportError> {
        let (ws, _response) =
            tokio_tungstenite::connect_async(url).await.map_err(|e| {
                TransportError::DialFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;
        tracing::debug!(url, "WebSocket connection established");
        Ok(WsLink { ws })
    }
}

/// A single client WebSocket connection.
pub struct WsLink {
    ws: WsStream,
}

impl Link for WsLink {
    async fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        let msg = Message::Text(frame.to_owned().into());
        self.ws.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    // The service speaks text JSON; tolerate a binary
                    // frame when it holds valid UTF-8, skip otherwise.
                    match String::from_utf8(data.into()) {
                        Ok(text) => return Ok(Some(text)),
                        Err(_) => continue,
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.ws.close(None).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}
