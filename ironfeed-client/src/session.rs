//! Transport sessions.
//!
//! The connection task only sees a [`FeedTransport`]: a sink of outbound
//! frames and a stream of inbound text frames. [`WebSocketConnector`] opens
//! real sessions; tests plug in their own [`Connector`].

use crate::error::ClientError;
use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::Message;

/// Frame written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// JSON control frame.
    Text(String),
    /// Transport-level keep-alive.
    Ping,
}

/// Boxed outbound half of a session.
pub type FrameSink = Pin<Box<dyn Sink<OutboundFrame, Error = ClientError> + Send>>;

/// Boxed inbound half of a session.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// One open transport session.
pub struct FeedTransport {
    /// Outbound frames.
    pub sink: FrameSink,
    /// Inbound text frames. Ends when the peer closes.
    pub stream: FrameStream,
}

impl FeedTransport {
    /// Creates a transport from any sink/stream pair.
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<OutboundFrame, Error = ClientError> + Send + 'static,
        R: Stream<Item = Result<String, ClientError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for FeedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedTransport").finish_non_exhaustive()
    }
}

/// Opens transport sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new session.
    ///
    /// # Errors
    /// Returns `ClientError` if the session cannot be established.
    async fn connect(&self) -> Result<FeedTransport, ClientError>;

    /// Endpoint description used in logs.
    fn endpoint(&self) -> &str;
}

/// WebSocket connector over `tokio-tungstenite` with rustls.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    /// Creates a connector for the given `wss://` URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<FeedTransport, ClientError> {
        let (ws, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (write, read) = ws.split();

        let sink = write
            .sink_map_err(ClientError::from)
            .with(|frame: OutboundFrame| {
                future::ready(Ok::<_, ClientError>(match frame {
                    OutboundFrame::Text(text) => Message::Text(text),
                    OutboundFrame::Ping => Message::Ping(Vec::new()),
                }))
            });

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "close frame received");
                    Some(Err(ClientError::ConnectionClosed))
                }
                Ok(_) => None,
                Err(err) => Some(Err(ClientError::from(err))),
            })
        });

        Ok(FeedTransport::new(sink, stream))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
