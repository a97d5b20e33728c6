use crate::error::SessionError;
use std::fmt;

/// Account credentials and the endpoint they sign requests for.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub api_key: String,
    pub api_secret: String,
    pub endpoint: String,
}

impl Credentials {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            endpoint: endpoint.into(),
        }
    }
}

// Keys stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Why a session ended before the server sent its final frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialReason {
    /// The connection closed (cleanly or not) before a LAST status arrived.
    ClosedEarly { code: Option<u16>, reason: String },
    /// The server answered with an error-shaped response.
    ServerError { code: i64, message: String },
    /// A response could not be parsed.
    Protocol(String),
    /// Sending or receiving failed at the transport level.
    Transport(String),
    /// The caller cancelled the session.
    Cancelled,
}

impl fmt::Display for PartialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialReason::ClosedEarly { code: Some(code), reason } => {
                write!(f, "connection closed early ({code} {reason})")
            }
            PartialReason::ClosedEarly { code: None, .. } => write!(f, "connection closed early"),
            PartialReason::ServerError { code, message } => {
                write!(f, "server error {code}: {message}")
            }
            PartialReason::Protocol(msg) => write!(f, "protocol error: {msg}"),
            PartialReason::Transport(msg) => write!(f, "transport error: {msg}"),
            PartialReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The server sent its LAST-status frame.
    Complete,
    Partial(PartialReason),
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completion::Complete)
    }
}

/// Assembled dictation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Partial results in arrival order.
    pub segments: Vec<String>,
    pub completion: Completion,
}

impl Transcript {
    pub fn text(&self) -> String {
        self.segments.concat()
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_complete()
    }

    /// Returns the joined text, or an error if the session did not finish normally.
    pub fn into_text(self) -> Result<String, SessionError> {
        match self.completion {
            Completion::Complete => Ok(self.segments.concat()),
            Completion::Partial(reason) => Err(SessionError::Incomplete(reason)),
        }
    }
}

/// Assembled synthesis output: 16-bit little-endian PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub audio: Vec<u8>,
    pub sample_rate: u32,
    pub completion: Completion,
}

impl Synthesis {
    pub fn samples(&self) -> Vec<i16> {
        crate::pcm::bytes_to_samples(&self.audio)
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_complete()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (self.audio.len() / 2) as f64 / self.sample_rate as f64
    }

    pub fn into_audio(self) -> Result<Vec<u8>, SessionError> {
        match self.completion {
            Completion::Complete => Ok(self.audio),
            Completion::Partial(reason) => Err(SessionError::Incomplete(reason)),
        }
    }
}
