use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::{Error, Result};
use crate::types::{AuthHandshake, ClientIdentity, Envelope};

/// Write half of a live connection, accepting wire envelopes
pub type EnvelopeSink = Pin<Box<dyn Sink<Envelope, Error = Error> + Send>>;

/// Read half of a live connection, yielding parsed wire envelopes
pub type EnvelopeStream = Pin<Box<dyn Stream<Item = Result<Envelope>> + Send>>;

/// WebSocket client for the live-poll realtime endpoint
///
/// Opens a connection, sends the authentication handshake carrying the
/// user's identity, and exposes the socket as an envelope sink/stream
/// pair. The handshake is part of establishing the connection, so every
/// reconnect re-authenticates automatically.
///
/// # Connection Management
///
/// For production use, wrap the subscription in a
/// [`ReconnectingStream`](crate::websocket::ReconnectingStream) or drive
/// the connection through [`LiveConnection`](crate::websocket::LiveConnection),
/// both of which reconnect with exponential backoff.
#[derive(Debug, Clone)]
pub struct PollWsClient {
    ws_url: String,
}

impl PollWsClient {
    /// Create a new client for the given realtime endpoint
    ///
    /// # Arguments
    ///
    /// * `ws_url` - The WebSocket URL (e.g., "wss://learn.example.edu/ws/live")
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    /// Open a connection and authenticate as `identity`
    ///
    /// Returns the write and read halves of the socket. Outbound envelopes
    /// are serialized on the way into the sink; inbound text frames are
    /// parsed into [`Envelope`] values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The WebSocket connection fails
    /// - The authentication handshake cannot be sent
    pub async fn connect(
        &self,
        identity: &ClientIdentity,
    ) -> Result<(EnvelopeSink, EnvelopeStream)> {
        let (ws_stream, _) = connect_async(&self.ws_url).await?;

        let (mut write, read) = ws_stream.split();

        // Authenticate before handing the socket to the caller
        let handshake = serde_json::to_string(&AuthHandshake::new(identity))?;
        write
            .send(Message::Text(handshake))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let sink: EnvelopeSink = Box::pin(
            write
                .sink_map_err(|e| Error::WebSocket(e.to_string()))
                .with(|envelope: Envelope| {
                    std::future::ready(
                        serde_json::to_string(&envelope)
                            .map(Message::Text)
                            .map_err(Error::Json),
                    )
                }),
        );

        let stream: EnvelopeStream =
            Box::pin(read.filter_map(|frame| async move { parse_frame(frame) }));

        Ok((sink, stream))
    }

    /// Subscribe to server events as `identity`, read-only
    ///
    /// Connects, authenticates, and returns a stream of parsed envelopes.
    /// Use [`connect`](Self::connect) instead when the caller also needs
    /// to send messages.
    pub async fn subscribe(&self, identity: &ClientIdentity) -> Result<EnvelopeStream> {
        let (sink, stream) = self.connect(identity).await?;
        drop(sink);
        Ok(stream)
    }
}

/// Map one WebSocket frame to at most one envelope.
///
/// Parse failures surface as per-message errors so one malformed payload
/// never tears down the connection; a close frame maps to
/// [`Error::ConnectionClosed`] so callers can distinguish it from
/// transport failures.
fn parse_frame(
    frame: std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<Envelope>> {
    match frame {
        Ok(Message::Text(text)) => {
            // Skip empty or whitespace-only messages
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }

            // Skip PING/PONG messages sent as text (some servers do this)
            if trimmed.eq_ignore_ascii_case("ping") || trimmed.eq_ignore_ascii_case("pong") {
                return None;
            }

            match serde_json::from_str::<Envelope>(&text) {
                Ok(envelope) => Some(Ok(envelope)),
                Err(e) => {
                    tracing::debug!(
                        preview = %text.chars().take(200).collect::<String>(),
                        "unexpected message format"
                    );
                    Some(Err(Error::Json(e)))
                }
            }
        }
        Ok(Message::Close(close_frame)) => {
            if let Some(frame) = close_frame {
                tracing::info!(code = %frame.code, reason = %frame.reason, "server closed connection");
            }
            Some(Err(Error::ConnectionClosed))
        }
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
            // Ignore ping/pong frames (handled automatically)
            None
        }
        Ok(Message::Binary(_)) => Some(Err(Error::WebSocket(
            "unexpected binary message".to_string(),
        ))),
        Ok(Message::Frame(_)) => {
            // Raw frame (shouldn't happen)
            None
        }
        Err(e) => Some(Err(Error::WebSocket(e.to_string()))),
    }
}
