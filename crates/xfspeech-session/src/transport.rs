use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use xfspeech_core::{PartialReason, SessionError, TransportError};

/// An inbound event on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A text message.
    Text(String),
    /// The connection is gone. `code` is `None` when no close frame was received.
    Closed { code: Option<u16>, reason: String },
}

/// Outbound half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    /// Sends a close frame. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Waits for the next text message or for the connection to close.
    async fn recv(&mut self) -> Result<Incoming, TransportError>;
}

/// A connection split into halves that can be driven from separate tasks.
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Opens connections to signed URLs.
///
/// [`WsConnector`](crate::WsConnector) talks to the real service;
/// [`ScriptedConnector`](crate::ScriptedConnector) replays canned responses.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;
}

/// Opens a connection unless `cancel` fires first.
pub(crate) async fn connect_cancellable(
    connector: &dyn Connector,
    url: &str,
    cancel: &CancellationToken,
) -> Result<Connection, SessionError> {
    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("cancelled while connecting");
            Err(SessionError::Incomplete(PartialReason::Cancelled))
        }
        connection = connector.connect(url) => connection.map_err(SessionError::from),
    }
}
