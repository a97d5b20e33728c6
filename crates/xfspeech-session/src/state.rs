//! Session lifecycles.
//!
//! Dictation:
//! - Idle -> Connecting (signing and opening the connection)
//! - Connecting -> Streaming (frames going out, results coming in)
//! - Streaming -> Completed (LAST-status result observed)
//! - Connecting | Streaming -> Failed
//!
//! Synthesis:
//! - Idle -> Connecting -> Sent (request frame written) -> Draining (first response received)
//! - Draining -> Completed (LAST-status fragment observed)
//! - Connecting | Sent | Draining -> Failed

use std::fmt;
use tokio::sync::watch;
use xfspeech_core::SessionError;

pub trait SessionState: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    const FAILED: Self;

    fn can_transition_to(&self, target: &Self) -> bool;

    fn is_terminal(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictationState {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
}

impl fmt::Display for DictationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DictationState::Idle => "Idle",
            DictationState::Connecting => "Connecting",
            DictationState::Streaming => "Streaming",
            DictationState::Completed => "Completed",
            DictationState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

impl SessionState for DictationState {
    const FAILED: Self = DictationState::Failed;

    fn can_transition_to(&self, target: &Self) -> bool {
        use DictationState::*;
        matches!(
            (self, target),
            (Idle, Connecting)
                | (Connecting, Streaming)
                | (Streaming, Completed)
                | (Connecting, Failed)
                | (Streaming, Failed)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, DictationState::Completed | DictationState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthesisState {
    Idle,
    Connecting,
    Sent,
    Draining,
    Completed,
    Failed,
}

impl fmt::Display for SynthesisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SynthesisState::Idle => "Idle",
            SynthesisState::Connecting => "Connecting",
            SynthesisState::Sent => "Sent",
            SynthesisState::Draining => "Draining",
            SynthesisState::Completed => "Completed",
            SynthesisState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

impl SessionState for SynthesisState {
    const FAILED: Self = SynthesisState::Failed;

    fn can_transition_to(&self, target: &Self) -> bool {
        use SynthesisState::*;
        matches!(
            (self, target),
            (Idle, Connecting)
                | (Connecting, Sent)
                | (Sent, Draining)
                | (Draining, Completed)
                | (Connecting, Failed)
                | (Sent, Failed)
                | (Draining, Failed)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, SynthesisState::Completed | SynthesisState::Failed)
    }
}

/// Validates transitions and publishes the current state to watchers.
#[derive(Debug)]
pub struct StateTracker<S: SessionState> {
    tx: watch::Sender<S>,
}

impl<S: SessionState> StateTracker<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> S {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    pub fn transition(&self, target: S) -> Result<(), SessionError> {
        let current = self.current();
        if !current.can_transition_to(&target) {
            return Err(SessionError::InvalidTransition {
                from: current.to_string(),
                to: target.to_string(),
            });
        }
        tracing::debug!("session state: {current} -> {target}");
        self.tx.send_replace(target);
        Ok(())
    }

    /// Moves to the failed state unless the session already ended.
    pub fn fail(&self) {
        if let Err(e) = self.transition(S::FAILED) {
            tracing::debug!("not marking session failed: {e}");
        }
    }
}
