//! JSON shapes exchanged over the WebSocket.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Connection-scoped parameters sent with the first frame.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommonArgs {
    pub app_id: String,
}

impl CommonArgs {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }
}

/// Recognition options for dictation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IatBusinessArgs {
    pub domain: String,
    pub language: String,
    pub accent: String,
    pub vinfo: u8,
    /// End-of-speech silence threshold in milliseconds.
    #[serde(rename = "vad_eos")]
    pub vad_eos_ms: u32,
}

impl Default for IatBusinessArgs {
    fn default() -> Self {
        Self {
            domain: "iat".to_string(),
            language: "zh_cn".to_string(),
            accent: "mandarin".to_string(),
            vinfo: 1,
            vad_eos_ms: 10000,
        }
    }
}

/// Synthesis options.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TtsBusinessArgs {
    #[serde(rename = "aue")]
    pub audio_encoding: String,
    #[serde(rename = "auf")]
    pub audio_format: String,
    #[serde(rename = "vcn")]
    pub voice: String,
    #[serde(rename = "tte")]
    pub text_encoding: String,
}

impl TtsBusinessArgs {
    pub fn new(voice: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            audio_encoding: "raw".to_string(),
            audio_format: crate::codec::audio_format(sample_rate),
            voice: voice.into(),
            text_encoding: "utf8".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BusinessArgs {
    Iat(IatBusinessArgs),
    Tts(TtsBusinessArgs),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FrameData {
    Audio {
        status: u8,
        format: String,
        /// Base64 of the raw PCM chunk.
        audio: String,
        encoding: String,
    },
    Text {
        status: u8,
        /// Base64 of the UTF-8 text.
        text: String,
    },
}

/// One message sent to the server.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutboundFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common: Option<CommonArgs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<BusinessArgs>,
    pub data: FrameData,
}

impl OutboundFrame {
    pub fn status(&self) -> u8 {
        match &self.data {
            FrameData::Audio { status, .. } | FrameData::Text { status, .. } => *status,
        }
    }

    /// The base64 payload, audio or text.
    pub fn payload(&self) -> &str {
        match &self.data {
            FrameData::Audio { audio, .. } => audio,
            FrameData::Text { text, .. } => text,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Envelope of every server message. Error responses carry a non-zero
/// `code` and no `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerMessage<D> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sid: Option<String>,
    pub data: Option<D>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IatData {
    pub status: u8,
    #[serde(default)]
    pub result: Option<IatResult>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IatResult {
    #[serde(default)]
    pub ws: Vec<WordSlot>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WordSlot {
    #[serde(default)]
    pub cw: Vec<WordCandidate>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WordCandidate {
    pub w: String,
}

impl IatResult {
    /// Flattens every candidate word, in order, into one string.
    pub fn text(&self) -> String {
        self.ws
            .iter()
            .flat_map(|slot| slot.cw.iter())
            .map(|cw| cw.w.as_str())
            .collect()
    }
}

impl IatData {
    pub fn text(&self) -> String {
        self.result.as_ref().map(IatResult::text).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TtsData {
    pub status: u8,
    /// Base64 PCM fragment.
    #[serde(default)]
    pub audio: Option<String>,
}

/// A server message split into its success and error shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response<D> {
    Data { sid: Option<String>, data: D },
    Error { code: i64, message: String },
}

pub fn decode_response<D: DeserializeOwned>(text: &str) -> Result<Response<D>, serde_json::Error> {
    let msg: ServerMessage<D> = serde_json::from_str(text)?;
    Ok(match (msg.code, msg.data) {
        (0, Some(data)) => Response::Data { sid: msg.sid, data },
        (0, None) => Response::Error {
            code: 0,
            message: if msg.message.is_empty() {
                "response has no data".to_string()
            } else {
                msg.message
            },
        },
        (code, _) => Response::Error {
            code,
            message: msg.message,
        },
    })
}
