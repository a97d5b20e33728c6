use crate::transport::{Connection, Connector, FrameSink, FrameSource, Incoming};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use xfspeech_core::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects over WebSocket (TLS for `wss://`).
#[derive(Debug, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        // Fails only if a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (stream, response) = connect_async(url).await.map_err(map_connect_error)?;
        tracing::debug!(status = %response.status(), "websocket handshake complete");

        let (sink, source) = stream.split();
        Ok(Connection {
            sink: Box::new(WsSink {
                inner: sink,
                closed: false,
            }),
            source: Box::new(WsSource { inner: source }),
        })
    }
}

fn map_connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Http(response) => TransportError::Rejected {
            status: response.status().as_u16(),
        },
        other => TransportError::Connect(other.to_string()),
    }
}

fn is_gone(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
    closed: bool,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.inner.close().await {
            Ok(()) => Ok(()),
            Err(e) if is_gone(&e) => Ok(()),
            Err(e) => Err(TransportError::Send(e.to_string())),
        }
    }
}

struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn recv(&mut self) -> Result<Incoming, TransportError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Incoming::Text(text)),
                Some(Ok(Message::Close(frame))) => {
                    return Ok(match frame {
                        Some(frame) => Incoming::Closed {
                            code: Some(u16::from(frame.code)),
                            reason: frame.reason.to_string(),
                        },
                        None => Incoming::Closed {
                            code: None,
                            reason: String::new(),
                        },
                    });
                }
                Some(Ok(Message::Binary(bytes))) => {
                    tracing::debug!(len = bytes.len(), "ignoring binary message");
                }
                // ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) if is_gone(&e) => {
                    return Ok(Incoming::Closed {
                        code: None,
                        reason: e.to_string(),
                    });
                }
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
                None => {
                    return Ok(Incoming::Closed {
                        code: None,
                        reason: String::new(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_connector_implements_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WsConnector>();
    }

    #[test]
    fn test_gone_errors() {
        assert!(is_gone(&tungstenite::Error::ConnectionClosed));
        assert!(is_gone(&tungstenite::Error::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        )));
        assert!(!is_gone(&tungstenite::Error::Utf8));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector::new()
            .connect(&format!("ws://{addr}/v2/iat"))
            .await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
