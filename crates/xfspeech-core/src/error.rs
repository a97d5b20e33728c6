use crate::types::PartialReason;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("invalid endpoint URL '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("endpoint URL has no host: {0}")]
    MissingHost(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("handshake rejected with HTTP status {status}")]
    Rejected { status: u16 },

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("failed to send frame: {0}")]
    Send(String),

    #[error("failed to receive frame: {0}")]
    Receive(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("connection rejected by server (HTTP {status})")]
    ConnectionRejected { status: u16 },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("nothing to send: {0}")]
    EmptyInput(&'static str),

    #[error("invalid session options: {0}")]
    InvalidOptions(String),

    #[error("failed to encode frame: {0}")]
    Encode(String),

    #[error("malformed server response: {0}")]
    Protocol(String),

    #[error("server returned error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("result incomplete: {0}")]
    Incomplete(PartialReason),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected { status } => SessionError::ConnectionRejected { status },
            TransportError::Connect(msg) => SessionError::Connect(msg),
            other => SessionError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_rejection_maps_to_connection_rejected() {
        let err: SessionError = TransportError::Rejected { status: 401 }.into();
        match err {
            SessionError::ConnectionRejected { status } => assert_eq!(status, 401),
            other => panic!("expected ConnectionRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_transport_send_failure_maps_to_transport() {
        let err: SessionError = TransportError::Send("broken pipe".to_string()).into();
        assert!(matches!(err, SessionError::Transport(_)));
        assert!(err.to_string().contains("broken pipe"));
    }

    #[test]
    fn test_signing_error_is_transparent() {
        let err: SessionError = SigningError::MissingHost("file:///tmp".to_string()).into();
        assert_eq!(err.to_string(), "endpoint URL has no host: file:///tmp");
    }
}
