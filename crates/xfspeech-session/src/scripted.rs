use crate::transport::{Connection, Connector, FrameSink, FrameSource, Incoming};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use xfspeech_core::TransportError;

/// One step of a canned server conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Deliver an inbound event.
    Reply(Incoming),
    /// Hold the next event back for a while.
    Delay(Duration),
    /// Hold the next event back until this many frames were sent.
    AwaitFrames(usize),
}

/// A [`Connector`] that replays a fixed script and records what was sent.
///
/// Once the script is exhausted the source stays silent, like an idle server.
pub struct ScriptedConnector {
    script: Vec<ScriptStep>,
    reject_status: Option<u16>,
    hang: bool,
    failing_from: Option<usize>,
    sent: Arc<Mutex<Vec<String>>>,
    urls: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            reject_status: None,
            hang: false,
            failing_from: None,
            sent: Arc::new(Mutex::new(Vec::new())),
            urls: Arc::new(Mutex::new(Vec::new())),
            connections: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every handshake fails with `status`.
    pub fn rejecting(status: u16) -> Self {
        let mut connector = Self::new(Vec::new());
        connector.reject_status = Some(status);
        connector
    }

    /// Every handshake stalls forever.
    pub fn hanging() -> Self {
        let mut connector = Self::new(Vec::new());
        connector.hang = true;
        connector
    }

    /// Sends fail from the `n`th frame (zero-based) onwards.
    pub fn failing_sends_from(mut self, n: usize) -> Self {
        self.failing_from = Some(n);
        self
    }

    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// How many connections the client closed.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        if let Some(status) = self.reject_status {
            return Err(TransportError::Rejected { status });
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.connections.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }

        let (count_tx, count_rx) = watch::channel(0usize);
        Ok(Connection {
            sink: Box::new(ScriptedSink {
                sent: Arc::clone(&self.sent),
                closes: Arc::clone(&self.closes),
                closed: false,
                attempts: 0,
                failing_from: self.failing_from,
                count_tx,
            }),
            source: Box::new(ScriptedSource {
                steps: self.script.iter().cloned().collect(),
                count_rx,
            }),
        })
    }
}

struct ScriptedSink {
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
    closed: bool,
    attempts: usize,
    failing_from: Option<usize>,
    count_tx: watch::Sender<usize>,
}

#[async_trait]
impl FrameSink for ScriptedSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Send("connection closed".to_string()));
        }
        self.attempts += 1;
        if self.failing_from.is_some_and(|n| self.attempts > n) {
            return Err(TransportError::Send("broken pipe".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(text);
        }
        self.count_tx.send_modify(|n| *n += 1);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
    count_rx: watch::Receiver<usize>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn recv(&mut self) -> Result<Incoming, TransportError> {
        // Steps are popped only once done so a dropped recv() resumes where it left off.
        while let Some(step) = self.steps.front().cloned() {
            match step {
                ScriptStep::Reply(incoming) => {
                    self.steps.pop_front();
                    return Ok(incoming);
                }
                ScriptStep::Delay(duration) => tokio::time::sleep(duration).await,
                ScriptStep::AwaitFrames(n) => {
                    // An error means the sink is gone; stop waiting.
                    let _ = self.count_rx.wait_for(|sent| *sent >= n).await;
                }
            }
            self.steps.pop_front();
        }
        std::future::pending().await
    }
}

/// A dictation result message whose word groups are `groups`.
pub fn iat_response(status: u8, groups: &[&[&str]]) -> Incoming {
    let ws: Vec<serde_json::Value> = groups
        .iter()
        .map(|group| {
            let cw: Vec<serde_json::Value> = group.iter().map(|w| json!({ "w": w })).collect();
            json!({ "cw": cw })
        })
        .collect();
    Incoming::Text(
        json!({
            "code": 0,
            "message": "success",
            "sid": "scripted",
            "data": { "status": status, "result": { "ws": ws } }
        })
        .to_string(),
    )
}

/// A synthesis message carrying `audio` as a base64 fragment.
pub fn tts_response(status: u8, audio: &[u8]) -> Incoming {
    Incoming::Text(
        json!({
            "code": 0,
            "message": "success",
            "sid": "scripted",
            "data": { "status": status, "audio": STANDARD.encode(audio) }
        })
        .to_string(),
    )
}

/// An error-shaped response.
pub fn error_response(code: i64, message: &str) -> Incoming {
    Incoming::Text(json!({ "code": code, "message": message, "sid": "scripted" }).to_string())
}

pub fn closed(code: Option<u16>) -> Incoming {
    Incoming::Closed {
        code,
        reason: String::new(),
    }
}
