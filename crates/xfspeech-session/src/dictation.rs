//! Streaming speech-to-text.
//!
//! A dictation runs two tasks over one connection: the sender paces audio
//! frames out, the receiver turns server messages into partial transcripts.
//! Whichever side stops first cancels the session token, which tears the
//! other side down and closes the connection.

use crate::state::{DictationState, StateTracker};
use crate::transport::{
    connect_cancellable, Connection, Connector, FrameSink, FrameSource, Incoming,
};
use crate::ws::WsConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use xfspeech_core::{
    Completion, Credentials, IatConfig, PartialReason, SessionError, Transcript, TransportError,
};
use xfspeech_protocol::{
    decode_response, encode_audio_frames, sign, CommonArgs, FrameStatus, IatBusinessArgs,
    IatData, Response, DEFAULT_CHUNK_SIZE,
};

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(40);

const OUTBOUND_STOPPED: &str = "frame sender stopped";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictationOptions {
    /// Bytes of PCM per frame.
    pub chunk_size: usize,
    /// Pause between frames.
    pub frame_interval: Duration,
    pub business: IatBusinessArgs,
}

impl Default for DictationOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            business: IatBusinessArgs::default(),
        }
    }
}

impl From<&IatConfig> for DictationOptions {
    fn from(config: &IatConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            frame_interval: Duration::from_millis(config.frame_interval_ms),
            business: IatBusinessArgs {
                domain: config.domain.clone(),
                language: config.language.clone(),
                accent: config.accent.clone(),
                vinfo: config.vinfo,
                vad_eos_ms: config.vad_eos_ms,
            },
        }
    }
}

/// Dictation client. Holds credentials only; every call opens its own connection.
#[derive(Clone)]
pub struct IatClient {
    credentials: Credentials,
    options: DictationOptions,
    connector: Arc<dyn Connector>,
}

impl IatClient {
    pub fn new(credentials: Credentials, connector: Arc<dyn Connector>) -> Self {
        Self {
            credentials,
            options: DictationOptions::default(),
            connector,
        }
    }

    pub fn from_config(config: &IatConfig) -> Self {
        Self::new(config.credentials(), Arc::new(WsConnector::new())).with_options(config.into())
    }

    pub fn with_options(mut self, options: DictationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DictationOptions {
        &self.options
    }

    /// Starts dictating `pcm` (16-bit little-endian mono at `sample_rate`).
    ///
    /// Returns once the connection is open. Partial transcripts are read from
    /// the returned [`Dictation`]. Cancelling `cancel` ends the session early.
    ///
    /// # Errors
    ///
    /// Fails without connecting if `pcm` is empty, the options are invalid or
    /// the endpoint cannot be signed, and fails if the server rejects the
    /// handshake. Cancelling before the connection opens gives
    /// [`SessionError::Incomplete`] with [`PartialReason::Cancelled`].
    pub async fn dictate(
        &self,
        pcm: Vec<u8>,
        sample_rate: u32,
        cancel: CancellationToken,
    ) -> Result<Dictation, SessionError> {
        if pcm.is_empty() {
            return Err(SessionError::EmptyInput("audio buffer is empty"));
        }
        if sample_rate == 0 {
            return Err(SessionError::InvalidOptions(
                "sample_rate must be positive".to_string(),
            ));
        }
        if self.options.chunk_size == 0 {
            return Err(SessionError::InvalidOptions(
                "chunk_size must be positive".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(SessionError::Incomplete(PartialReason::Cancelled));
        }

        let tracker = StateTracker::new(DictationState::Idle);
        tracker.transition(DictationState::Connecting)?;

        let signed = match sign(&self.credentials) {
            Ok(signed) => signed,
            Err(e) => {
                tracker.fail();
                return Err(e.into());
            }
        };
        let connected =
            connect_cancellable(self.connector.as_ref(), signed.as_str(), &cancel).await;
        let Connection { sink, source } = match connected {
            Ok(connection) => connection,
            Err(e) => {
                if !matches!(e, SessionError::Incomplete(_)) {
                    tracing::error!(
                        endpoint = %self.credentials.endpoint,
                        "dictation connect failed: {e}"
                    );
                }
                tracker.fail();
                return Err(e);
            }
        };
        tracker.transition(DictationState::Streaming)?;

        tracing::info!(
            bytes = pcm.len(),
            frames = pcm.len().div_ceil(self.options.chunk_size),
            sample_rate,
            "dictation started"
        );

        // `stop` is the caller's cancellation; `session` also fires on teardown.
        let stop = cancel.child_token();
        let session = stop.child_token();
        let (partial_tx, partial_rx) = mpsc::unbounded_channel();
        let state = tracker.subscribe();

        let sender = tokio::spawn(send_frames(
            sink,
            pcm,
            sample_rate,
            self.options.clone(),
            CommonArgs::new(&self.credentials.app_id),
            session.clone(),
        ));
        let receiver = tokio::spawn(receive_results(
            source,
            partial_tx,
            tracker,
            stop.clone(),
            session.clone(),
        ));

        Ok(Dictation {
            partials: partial_rx,
            segments: Vec::new(),
            state,
            stop,
            sender,
            receiver,
            teardown: session.drop_guard(),
        })
    }

    /// Dictates `pcm` and waits for the whole transcript.
    pub async fn transcribe(
        &self,
        pcm: Vec<u8>,
        sample_rate: u32,
        cancel: CancellationToken,
    ) -> Result<Transcript, SessionError> {
        Ok(self.dictate(pcm, sample_rate, cancel).await?.finish().await)
    }
}

/// A running dictation.
///
/// Dropping it tears the session down and closes the connection.
pub struct Dictation {
    partials: mpsc::UnboundedReceiver<String>,
    segments: Vec<String>,
    state: watch::Receiver<DictationState>,
    stop: CancellationToken,
    sender: JoinHandle<Result<usize, TransportError>>,
    receiver: JoinHandle<Completion>,
    teardown: DropGuard,
}

impl Dictation {
    /// The next partial transcript, or `None` once the session has ended.
    pub async fn next_partial(&mut self) -> Option<String> {
        let segment = self.partials.recv().await?;
        self.segments.push(segment.clone());
        Some(segment)
    }

    pub fn state(&self) -> DictationState {
        *self.state.borrow()
    }

    pub fn cancel(&self) {
        self.stop.cancel();
    }

    /// Drains the remaining partials and reports how the session ended.
    pub async fn finish(self) -> Transcript {
        let Dictation {
            mut partials,
            mut segments,
            sender,
            receiver,
            teardown,
            ..
        } = self;

        while let Some(segment) = partials.recv().await {
            segments.push(segment);
        }

        let mut completion = match receiver.await {
            Ok(completion) => completion,
            Err(e) => Completion::Partial(PartialReason::Transport(format!(
                "receiver task failed: {e}"
            ))),
        };
        teardown.disarm().cancel();

        match sender.await {
            Ok(Ok(frames)) => tracing::debug!(frames, "dictation sender finished"),
            Ok(Err(e)) => {
                let stopped = PartialReason::Transport(OUTBOUND_STOPPED.to_string());
                if completion == Completion::Partial(stopped) {
                    completion = Completion::Partial(PartialReason::Transport(e.to_string()));
                }
            }
            Err(e) => tracing::warn!("dictation sender task failed: {e}"),
        }

        if let Completion::Partial(reason) = &completion {
            tracing::warn!(segments = segments.len(), "dictation result is partial: {reason}");
        }

        Transcript {
            segments,
            completion,
        }
    }
}

async fn send_frames(
    mut sink: Box<dyn FrameSink>,
    pcm: Vec<u8>,
    sample_rate: u32,
    options: DictationOptions,
    common: CommonArgs,
    session: CancellationToken,
) -> Result<usize, TransportError> {
    let result =
        stream_frames(sink.as_mut(), &pcm, sample_rate, &options, common, &session).await;
    match &result {
        Ok(frames) => tracing::debug!(frames, "audio frames sent"),
        Err(e) => {
            tracing::error!("sending audio frame failed: {e}");
            session.cancel();
        }
    }

    // Results keep arriving after the last frame; hold the connection until the receiver is done.
    session.cancelled().await;
    if let Err(e) = sink.close().await {
        tracing::debug!("closing dictation connection failed: {e}");
    }
    result
}

async fn stream_frames(
    sink: &mut dyn FrameSink,
    pcm: &[u8],
    sample_rate: u32,
    options: &DictationOptions,
    common: CommonArgs,
    session: &CancellationToken,
) -> Result<usize, TransportError> {
    let frames = encode_audio_frames(
        pcm,
        sample_rate,
        options.chunk_size,
        common,
        options.business.clone(),
    );
    let total = frames.len();
    let mut sent = 0;

    for frame in frames {
        if session.is_cancelled() {
            break;
        }
        let json = frame
            .to_json()
            .map_err(|e| TransportError::Send(e.to_string()))?;
        sink.send_text(json).await?;
        sent += 1;
        tracing::trace!(frame = sent, total, status = frame.status(), "sent audio frame");

        if sent < total {
            tokio::select! {
                _ = session.cancelled() => break,
                _ = tokio::time::sleep(options.frame_interval) => {}
            }
        }
    }
    Ok(sent)
}

async fn receive_results(
    mut source: Box<dyn FrameSource>,
    partials: mpsc::UnboundedSender<String>,
    tracker: StateTracker<DictationState>,
    stop: CancellationToken,
    session: CancellationToken,
) -> Completion {
    let completion = drain_results(source.as_mut(), &partials, &stop, &session).await;
    session.cancel();

    if completion.is_complete() {
        if let Err(e) = tracker.transition(DictationState::Completed) {
            tracing::warn!("{e}");
        }
    } else {
        tracker.fail();
    }
    // Closing the channel ends the partial sequence after the final state is published.
    drop(partials);
    completion
}

async fn drain_results(
    source: &mut dyn FrameSource,
    partials: &mpsc::UnboundedSender<String>,
    stop: &CancellationToken,
    session: &CancellationToken,
) -> Completion {
    let mut received = 0usize;
    loop {
        let incoming = tokio::select! {
            _ = session.cancelled() => {
                let reason = if stop.is_cancelled() {
                    PartialReason::Cancelled
                } else {
                    PartialReason::Transport(OUTBOUND_STOPPED.to_string())
                };
                return Completion::Partial(reason);
            }
            incoming = source.recv() => incoming,
        };

        let text = match incoming {
            Ok(Incoming::Text(text)) => text,
            Ok(Incoming::Closed { code, reason }) => {
                tracing::warn!(
                    code = ?code,
                    reason = %reason,
                    received,
                    "connection closed before the final dictation result"
                );
                return Completion::Partial(PartialReason::ClosedEarly { code, reason });
            }
            Err(e) => {
                tracing::error!(received, "dictation receive failed: {e}");
                return Completion::Partial(PartialReason::Transport(e.to_string()));
            }
        };

        match decode_response::<IatData>(&text) {
            Ok(Response::Data { sid, data }) => {
                received += 1;
                let segment = data.text();
                tracing::debug!(
                    status = data.status,
                    sid = sid.as_deref().unwrap_or_default(),
                    segment = %segment,
                    "dictation result"
                );
                // The caller may have stopped listening; keep draining to the end.
                let _ = partials.send(segment);
                if data.status == FrameStatus::Last.code() {
                    tracing::info!(results = received, "dictation complete");
                    return Completion::Complete;
                }
            }
            Ok(Response::Error { code, message }) => {
                tracing::warn!(code, message = %message, "dictation rejected by server");
                return Completion::Partial(PartialReason::ServerError { code, message });
            }
            Err(e) => {
                tracing::warn!("unparseable dictation response: {e}");
                return Completion::Partial(PartialReason::Protocol(e.to_string()));
            }
        }
    }
}
