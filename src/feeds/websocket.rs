use super::connection::{ConnectError, Connector, Transport};
use super::record::RawMessage;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

/// Connects over WebSockets (`ws://` or `wss://`).
pub struct WsConnector {
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, target: &Url) -> Result<Box<dyn Transport>, ConnectError> {
        let fail = |reason: String| ConnectError {
            target: target.to_string(),
            reason,
        };

        let handshake = tokio_tungstenite::connect_async(target.as_str());
        let (socket, response) = tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| fail("handshake timed out".to_string()))?
            .map_err(|e| fail(e.to_string()))?;

        debug!(status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsTransport { socket }))
    }
}

struct WsTransport {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_message(&mut self) -> Option<RawMessage> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(RawMessage::from(text.as_str())),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => return Some(RawMessage::from(text)),
                    Err(_) => debug!(len = bytes.len(), "dropping non-UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "server closed the stream");
                    return None;
                }
                // Ping replies are queued by tungstenite itself.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Err(err) => {
                    warn!(error = %err, "websocket read failed");
                    return None;
                }
            }
        }
    }
}
