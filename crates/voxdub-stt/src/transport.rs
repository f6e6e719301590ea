//! Recognition session transport.
//!
//! The client treats the wire as a black box behind `RecognitionTransport`;
//! the production implementation is a WebSocket carrying JSON control
//! messages and binary PCM frames.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::protocol::{EndOfStream, ServerMessage, StartRecognition};
use voxdub_foundation::SessionError;

#[async_trait]
pub trait RecognitionTransport: Send {
    /// Open the session and send the `StartRecognition` declaration.
    async fn open(&mut self, token: &str, start: &StartRecognition) -> Result<(), SessionError>;

    /// Send one binary PCM frame. Ownership of the bytes moves to the
    /// transport.
    async fn send_audio(&mut self, frame: Vec<u8>) -> Result<(), SessionError>;

    /// Next control message, in delivery order. `None` means the stream
    /// closed.
    async fn next_event(&mut self) -> Option<Result<ServerMessage, SessionError>>;

    /// Request immediate termination; does not wait for acknowledgement.
    async fn close(&mut self, last_seq_no: u64) -> Result<(), SessionError>;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// WebSocket transport. The session token travels as the `jwt` query
/// parameter on the connection URL.
pub struct WsTransport {
    endpoint: Url,
    sink: Option<WsSink>,
    source: Option<WsSource>,
}

impl WsTransport {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            sink: None,
            source: None,
        }
    }
}

#[async_trait]
impl RecognitionTransport for WsTransport {
    async fn open(&mut self, token: &str, start: &StartRecognition) -> Result<(), SessionError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("jwt", token);

        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SessionError::StartFailed(e.to_string()))?;
        let (mut sink, source) = ws.split();

        let payload = serde_json::to_string(start)
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        sink.send(Message::Text(payload))
            .await
            .map_err(|e| SessionError::StartFailed(e.to_string()))?;

        self.sink = Some(sink);
        self.source = Some(source);
        tracing::info!(target: "stt", "Recognition session opened at {}", self.endpoint);
        Ok(())
    }

    async fn send_audio(&mut self, frame: Vec<u8>) -> Result<(), SessionError> {
        let sink = self.sink.as_mut().ok_or(SessionError::Closed)?;
        sink.send(Message::Binary(frame))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<Result<ServerMessage, SessionError>> {
        let source = self.source.as_mut()?;
        loop {
            match source.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(
                        serde_json::from_str::<ServerMessage>(&text)
                            .map_err(|e| SessionError::Protocol(e.to_string())),
                    );
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue, // binary/ping/pong carry no session events
                Err(e) => return Some(Err(SessionError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self, last_seq_no: u64) -> Result<(), SessionError> {
        if let Some(mut sink) = self.sink.take() {
            // Best-effort: the termination request and the close frame both
            // fire without waiting for the server.
            if let Ok(payload) = serde_json::to_string(&EndOfStream::new(last_seq_no)) {
                let _ = sink.send(Message::Text(payload)).await;
            }
            let _ = sink.send(Message::Close(None)).await;
        }
        self.source = None;
        Ok(())
    }
}
