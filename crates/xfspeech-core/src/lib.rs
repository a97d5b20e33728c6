pub mod config;
pub mod error;
pub mod pcm;
pub mod types;

pub use config::{AppConfig, IatConfig, TtsConfig};
pub use error::{ConfigError, SessionError, SigningError, TransportError};
pub use types::{Completion, Credentials, PartialReason, Synthesis, Transcript};

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("app", "key-123", "secret-456", "wss://ws-api.xfyun.cn/v2/iat")
    }

    #[test]
    fn test_credentials_debug_redacts_keys() {
        let rendered = format!("{:?}", creds());
        assert!(rendered.contains("app"));
        assert!(rendered.contains("wss://ws-api.xfyun.cn/v2/iat"));
        assert!(!rendered.contains("key-123"));
        assert!(!rendered.contains("secret-456"));
    }

    #[test]
    fn test_transcript_joins_segments_in_order() {
        let transcript = Transcript {
            segments: vec!["今天".to_string(), String::new(), "天气".to_string()],
            completion: Completion::Complete,
        };
        assert_eq!(transcript.text(), "今天天气");
        assert!(transcript.is_complete());
        assert_eq!(transcript.into_text().unwrap(), "今天天气");
    }

    #[test]
    fn test_partial_transcript_into_text_fails() {
        let transcript = Transcript {
            segments: vec!["hel".to_string()],
            completion: Completion::Partial(PartialReason::ClosedEarly {
                code: Some(1006),
                reason: String::new(),
            }),
        };
        assert_eq!(transcript.text(), "hel");
        assert!(!transcript.is_complete());
        match transcript.into_text() {
            Err(SessionError::Incomplete(PartialReason::ClosedEarly { code, .. })) => {
                assert_eq!(code, Some(1006))
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn test_synthesis_samples_and_duration() {
        let synthesis = Synthesis {
            audio: pcm::samples_to_bytes(&[0i16; 16000]),
            sample_rate: 16000,
            completion: Completion::Complete,
        };
        assert_eq!(synthesis.samples().len(), 16000);
        assert!((synthesis.duration_secs() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_reason_display() {
        let reason = PartialReason::ServerError {
            code: 10165,
            message: "invalid handle".to_string(),
        };
        assert_eq!(reason.to_string(), "server error 10165: invalid handle");
        assert_eq!(PartialReason::Cancelled.to_string(), "cancelled");
    }
}
