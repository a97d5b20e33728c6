//! Text-to-speech: one request frame out, base64 audio fragments back.

use crate::state::{StateTracker, SynthesisState};
use crate::transport::{connect_cancellable, Connection, Connector, FrameSource, Incoming};
use crate::ws::WsConnector;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use xfspeech_core::{Completion, Credentials, PartialReason, SessionError, Synthesis, TtsConfig};
use xfspeech_protocol::{
    decode_response, encode_synthesis_request, sign, CommonArgs, FrameStatus, Response,
    TtsBusinessArgs, TtsData,
};

pub const DEFAULT_VOICE: &str = "xiaoyan";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub voice: String,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
        }
    }
}

impl From<&TtsConfig> for SynthesisOptions {
    fn from(config: &TtsConfig) -> Self {
        Self {
            voice: config.voice.clone(),
        }
    }
}

/// Synthesis client. Every call opens its own connection.
#[derive(Clone)]
pub struct TtsClient {
    credentials: Credentials,
    options: SynthesisOptions,
    connector: Arc<dyn Connector>,
}

impl TtsClient {
    pub fn new(credentials: Credentials, connector: Arc<dyn Connector>) -> Self {
        Self {
            credentials,
            options: SynthesisOptions::default(),
            connector,
        }
    }

    pub fn from_config(config: &TtsConfig) -> Self {
        Self::new(config.credentials(), Arc::new(WsConnector::new())).with_options(config.into())
    }

    pub fn with_options(mut self, options: SynthesisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Synthesizes `text` into 16-bit mono PCM at `sample_rate`.
    ///
    /// Audio received before the connection drops or `cancel` fires is kept
    /// and the result is marked partial.
    ///
    /// # Errors
    ///
    /// Fails on empty text, on signing or handshake failure, when the server
    /// answers with an error, and when a response cannot be decoded.
    /// Cancelling before the connection opens gives
    /// [`SessionError::Incomplete`] with [`PartialReason::Cancelled`].
    pub async fn synthesize(
        &self,
        text: &str,
        sample_rate: u32,
        cancel: CancellationToken,
    ) -> Result<Synthesis, SessionError> {
        if text.is_empty() {
            return Err(SessionError::EmptyInput("text is empty"));
        }
        if sample_rate == 0 {
            return Err(SessionError::InvalidOptions(
                "sample_rate must be positive".to_string(),
            ));
        }

        let request = encode_synthesis_request(
            text,
            CommonArgs::new(&self.credentials.app_id),
            TtsBusinessArgs::new(&self.options.voice, sample_rate),
        )
        .to_json()
        .map_err(|e| SessionError::Encode(e.to_string()))?;

        if cancel.is_cancelled() {
            return Err(SessionError::Incomplete(PartialReason::Cancelled));
        }

        let tracker = StateTracker::new(SynthesisState::Idle);
        tracker.transition(SynthesisState::Connecting)?;

        let signed = match sign(&self.credentials) {
            Ok(signed) => signed,
            Err(e) => {
                tracker.fail();
                return Err(e.into());
            }
        };
        let connected =
            connect_cancellable(self.connector.as_ref(), signed.as_str(), &cancel).await;
        let Connection {
            mut sink,
            mut source,
        } = match connected {
            Ok(connection) => connection,
            Err(e) => {
                if !matches!(e, SessionError::Incomplete(_)) {
                    tracing::error!(
                        endpoint = %self.credentials.endpoint,
                        "synthesis connect failed: {e}"
                    );
                }
                tracker.fail();
                return Err(e);
            }
        };

        tracing::info!(
            chars = text.chars().count(),
            voice = %self.options.voice,
            sample_rate,
            "synthesis started"
        );

        let result: Result<(Vec<u8>, Completion), SessionError> = async {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Ok((Vec::new(), Completion::Partial(PartialReason::Cancelled)));
                }
                sent = sink.send_text(request) => sent?,
            }
            tracker.transition(SynthesisState::Sent)?;
            drain_audio(source.as_mut(), &tracker, &cancel).await
        }
        .await;

        if let Err(e) = sink.close().await {
            tracing::debug!("closing synthesis connection failed: {e}");
        }

        match result {
            Ok((audio, completion)) => {
                match &completion {
                    Completion::Complete => tracker.transition(SynthesisState::Completed)?,
                    Completion::Partial(reason) => {
                        tracing::warn!(
                            bytes = audio.len(),
                            "synthesis result is partial: {reason}"
                        );
                        tracker.fail();
                    }
                }
                Ok(Synthesis {
                    audio,
                    sample_rate,
                    completion,
                })
            }
            Err(e) => {
                tracing::error!("synthesis failed: {e}");
                tracker.fail();
                Err(e)
            }
        }
    }
}

/// Reads fragments until LAST. Moves to `Draining` once the first audio
/// response arrives.
async fn drain_audio(
    source: &mut dyn FrameSource,
    tracker: &StateTracker<SynthesisState>,
    cancel: &CancellationToken,
) -> Result<(Vec<u8>, Completion), SessionError> {
    let mut audio = Vec::new();
    let mut fragments = 0usize;
    loop {
        let incoming = tokio::select! {
            _ = cancel.cancelled() => {
                return Ok((audio, Completion::Partial(PartialReason::Cancelled)));
            }
            incoming = source.recv() => incoming,
        };

        let text = match incoming {
            Ok(Incoming::Text(text)) => text,
            Ok(Incoming::Closed { code, reason }) => {
                tracing::warn!(
                    code = ?code,
                    reason = %reason,
                    fragments,
                    "connection closed before the final audio fragment"
                );
                let reason = PartialReason::ClosedEarly { code, reason };
                return Ok((audio, Completion::Partial(reason)));
            }
            Err(e) => {
                tracing::error!(fragments, "synthesis receive failed: {e}");
                let reason = PartialReason::Transport(e.to_string());
                return Ok((audio, Completion::Partial(reason)));
            }
        };

        let response = decode_response::<TtsData>(&text)
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        match response {
            Response::Data { sid, data } => {
                if fragments == 0 {
                    tracker.transition(SynthesisState::Draining)?;
                }
                if let Some(fragment) = data.audio.as_deref().filter(|a| !a.is_empty()) {
                    let bytes = STANDARD.decode(fragment).map_err(|e| {
                        SessionError::Protocol(format!("invalid audio fragment: {e}"))
                    })?;
                    audio.extend_from_slice(&bytes);
                }
                fragments += 1;
                tracing::trace!(
                    status = data.status,
                    sid = sid.as_deref().unwrap_or_default(),
                    total = audio.len(),
                    "audio fragment"
                );
                if data.status == FrameStatus::Last.code() {
                    tracing::info!(fragments, bytes = audio.len(), "synthesis complete");
                    return Ok((audio, Completion::Complete));
                }
            }
            Response::Error { code, message } => {
                tracing::warn!(code, message = %message, "synthesis rejected by server");
                return Err(SessionError::Server { code, message });
            }
        }
    }
}
