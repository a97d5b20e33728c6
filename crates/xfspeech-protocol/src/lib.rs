//! Signing and framing for the XFYun streaming speech protocol.

pub mod codec;
pub mod messages;
pub mod signer;

pub use codec::{
    audio_format, encode_audio_frames, encode_synthesis_request, AudioFrames, FrameStatus,
    DEFAULT_CHUNK_SIZE, DEFAULT_SAMPLE_RATE, SYNTHESIS_REQUEST_STATUS,
};
pub use messages::{
    decode_response, BusinessArgs, CommonArgs, FrameData, IatBusinessArgs, IatData, OutboundFrame,
    Response, TtsBusinessArgs, TtsData,
};
pub use signer::{sign, sign_at, SignedRequestUrl};
