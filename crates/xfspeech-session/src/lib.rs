//! Streaming dictation and synthesis sessions over WebSocket.

pub mod dictation;
pub mod scripted;
pub mod state;
pub mod synthesis;
pub mod transport;
pub mod ws;

pub use dictation::{Dictation, DictationOptions, IatClient, DEFAULT_FRAME_INTERVAL};
pub use scripted::{ScriptStep, ScriptedConnector};
pub use state::{DictationState, SessionState, StateTracker, SynthesisState};
pub use synthesis::{SynthesisOptions, TtsClient, DEFAULT_VOICE};
pub use tokio_util::sync::CancellationToken;
pub use transport::{Connection, Connector, FrameSink, FrameSource, Incoming};
pub use ws::WsConnector;
