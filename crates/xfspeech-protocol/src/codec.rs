//! Payload to frame conversion.

use crate::messages::{
    BusinessArgs, CommonArgs, FrameData, IatBusinessArgs, OutboundFrame, TtsBusinessArgs,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::iter::FusedIterator;
use std::slice::Chunks;

pub const DEFAULT_CHUNK_SIZE: usize = 1280;
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Status of the single synthesis request frame. Shares the value of
/// [`FrameStatus::Last`] on the wire but is a separate protocol marker.
pub const SYNTHESIS_REQUEST_STATUS: u8 = 2;

/// Position of a frame in a multi-frame exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStatus {
    First,
    Continue,
    Last,
}

impl FrameStatus {
    pub const fn code(self) -> u8 {
        match self {
            FrameStatus::First => 0,
            FrameStatus::Continue => 1,
            FrameStatus::Last => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FrameStatus::First),
            1 => Some(FrameStatus::Continue),
            2 => Some(FrameStatus::Last),
            _ => None,
        }
    }
}

pub fn audio_format(sample_rate: u32) -> String {
    format!("audio/L16;rate={sample_rate}")
}

/// Lazily turns a PCM buffer into dictation frames.
///
/// Produced by [`encode_audio_frames`]. The first frame carries the common
/// and business arguments; the frame whose window reaches the end of the
/// buffer is tagged LAST, which for a buffer shorter than one chunk is also
/// the first frame.
#[derive(Debug)]
pub struct AudioFrames<'a> {
    chunks: Chunks<'a, u8>,
    total: usize,
    consumed: usize,
    format: String,
    first_args: Option<(CommonArgs, IatBusinessArgs)>,
}

/// Splits `pcm` into `chunk_size` windows.
///
/// # Panics
///
/// Panics if `chunk_size` is 0.
pub fn encode_audio_frames(
    pcm: &[u8],
    sample_rate: u32,
    chunk_size: usize,
    common: CommonArgs,
    business: IatBusinessArgs,
) -> AudioFrames<'_> {
    assert!(chunk_size > 0, "chunk_size must be positive");
    AudioFrames {
        chunks: pcm.chunks(chunk_size),
        total: pcm.len(),
        consumed: 0,
        format: audio_format(sample_rate),
        first_args: Some((common, business)),
    }
}

impl Iterator for AudioFrames<'_> {
    type Item = OutboundFrame;

    fn next(&mut self) -> Option<OutboundFrame> {
        let chunk = self.chunks.next()?;
        self.consumed += chunk.len();

        let args = self.first_args.take();
        let status = if self.consumed >= self.total {
            FrameStatus::Last
        } else if args.is_some() {
            FrameStatus::First
        } else {
            FrameStatus::Continue
        };
        let (common, business) = match args {
            Some((common, business)) => (Some(common), Some(BusinessArgs::Iat(business))),
            None => (None, None),
        };

        Some(OutboundFrame {
            common,
            business,
            data: FrameData::Audio {
                status: status.code(),
                format: self.format.clone(),
                audio: STANDARD.encode(chunk),
                encoding: "raw".to_string(),
            },
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for AudioFrames<'_> {}

impl FusedIterator for AudioFrames<'_> {}

/// Builds the one frame of a synthesis request.
pub fn encode_synthesis_request(
    text: &str,
    common: CommonArgs,
    business: TtsBusinessArgs,
) -> OutboundFrame {
    OutboundFrame {
        common: Some(common),
        business: Some(BusinessArgs::Tts(business)),
        data: FrameData::Text {
            status: SYNTHESIS_REQUEST_STATUS,
            text: STANDARD.encode(text.as_bytes()),
        },
    }
}
