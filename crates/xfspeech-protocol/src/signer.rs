//! Connection URL signing.
//!
//! Every connection carries `authorization`, `date` and `host` query
//! parameters. The authorization is an HMAC-SHA256 over the host, the
//! RFC-1123 date and the request line, so a signed URL is only valid for a
//! short window and must be rebuilt for each connection attempt.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;
use xfspeech_core::{Credentials, SigningError};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_ALGORITHM: &str = "hmac-sha256";
pub const SIGNED_HEADERS: &str = "host date request-line";

/// A connection URL together with the values that went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequestUrl {
    pub url: Url,
    /// Base64 of the authorization descriptor.
    pub authorization: String,
    pub date: String,
    pub host: String,
}

impl SignedRequestUrl {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Formats `at` as an RFC-1123 date, e.g. `Tue, 02 Jan 2024 03:04:05 GMT`.
pub fn rfc1123(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn canonical_string(host: &str, date: &str, path: &str) -> String {
    format!("host: {host}\ndate: {date}\nGET {path} HTTP/1.1")
}

/// Signs `credentials.endpoint` with the current time.
pub fn sign(credentials: &Credentials) -> Result<SignedRequestUrl, SigningError> {
    sign_at(credentials, Utc::now())
}

/// Signs `credentials.endpoint` as of `at`. Identical inputs give identical URLs.
pub fn sign_at(
    credentials: &Credentials,
    at: DateTime<Utc>,
) -> Result<SignedRequestUrl, SigningError> {
    let endpoint =
        Url::parse(&credentials.endpoint).map_err(|e| SigningError::InvalidEndpoint {
            endpoint: credentials.endpoint.clone(),
            reason: e.to_string(),
        })?;
    let host = endpoint
        .host_str()
        .ok_or_else(|| SigningError::MissingHost(credentials.endpoint.clone()))?
        .to_string();
    let date = rfc1123(at);

    let canonical = canonical_string(&host, &date, endpoint.path());
    let signature = STANDARD.encode(hmac_sha256(&credentials.api_secret, &canonical));
    let descriptor = format!(
        "api_key=\"{}\", algorithm=\"{SIGNATURE_ALGORITHM}\", headers=\"{SIGNED_HEADERS}\", signature=\"{signature}\"",
        credentials.api_key
    );
    let authorization = STANDARD.encode(descriptor.as_bytes());

    let mut url = endpoint;
    url.query_pairs_mut()
        .append_pair("authorization", &authorization)
        .append_pair("date", &date)
        .append_pair("host", &host);

    tracing::trace!(url = %url, "signed connection URL");

    Ok(SignedRequestUrl {
        url,
        authorization,
        date,
        host,
    })
}

fn hmac_sha256(secret: &str, message: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn creds() -> Credentials {
        Credentials::new("app-1", "key-abc", "secret-xyz", "wss://ws-api.xfyun.cn/v2/iat")
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn decode_authorization(signed: &SignedRequestUrl) -> String {
        String::from_utf8(STANDARD.decode(&signed.authorization).unwrap()).unwrap()
    }

    #[test]
    fn test_rfc1123_format() {
        assert_eq!(rfc1123(fixed_time()), "Tue, 02 Jan 2024 03:04:05 GMT");
    }

    #[test]
    fn test_canonical_string_layout() {
        let s = canonical_string("ws-api.xfyun.cn", "Tue, 02 Jan 2024 03:04:05 GMT", "/v2/iat");
        assert_eq!(
            s,
            "host: ws-api.xfyun.cn\ndate: Tue, 02 Jan 2024 03:04:05 GMT\nGET /v2/iat HTTP/1.1"
        );
    }

    #[test]
    fn test_authorization_descriptor_fields() {
        let signed = sign_at(&creds(), fixed_time()).unwrap();
        let descriptor = decode_authorization(&signed);
        assert!(descriptor.contains("api_key=\"key-abc\""));
        assert!(descriptor.contains("algorithm=\"hmac-sha256\""));
        assert!(descriptor.contains("headers=\"host date request-line\""));
        assert!(descriptor.contains("signature=\""));
    }

    #[test]
    fn test_signature_verifies_against_canonical_string() {
        let signed = sign_at(&creds(), fixed_time()).unwrap();
        let descriptor = decode_authorization(&signed);
        let signature = descriptor
            .split("signature=\"")
            .nth(1)
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap();

        let mut mac = HmacSha256::new_from_slice(b"secret-xyz").unwrap();
        mac.update(canonical_string("ws-api.xfyun.cn", &signed.date, "/v2/iat").as_bytes());
        mac.verify_slice(&STANDARD.decode(signature).unwrap())
            .expect("signature should verify");
    }

    #[test]
    fn test_url_carries_query_parameters() {
        let signed = sign_at(&creds(), fixed_time()).unwrap();
        assert!(signed
            .as_str()
            .starts_with("wss://ws-api.xfyun.cn/v2/iat?authorization="));

        let pairs: Vec<(String, String)> = signed
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("authorization".to_string(), signed.authorization.clone()),
                ("date".to_string(), "Tue, 02 Jan 2024 03:04:05 GMT".to_string()),
                ("host".to_string(), "ws-api.xfyun.cn".to_string()),
            ]
        );
        // spaces and commas in the date are escaped
        assert!(signed.as_str().contains("date=Tue%2C+02+Jan+2024+03%3A04%3A05+GMT"));
    }

    #[test]
    fn test_same_instant_is_deterministic() {
        let a = sign_at(&creds(), fixed_time()).unwrap();
        let b = sign_at(&creds(), fixed_time()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_instants_differ() {
        let a = sign_at(&creds(), fixed_time()).unwrap();
        let later = fixed_time() + chrono::Duration::seconds(1);
        let b = sign_at(&creds(), later).unwrap();
        assert_ne!(a.date, b.date);
        assert_ne!(a.authorization, b.authorization);
    }

    #[test]
    fn test_host_excludes_port() {
        let local = Credentials::new("a", "k", "s", "ws://127.0.0.1:9001/v2/tts");
        let signed = sign_at(&local, fixed_time()).unwrap();
        assert_eq!(signed.host, "127.0.0.1");
        assert!(signed.as_str().starts_with("ws://127.0.0.1:9001/v2/tts?"));
    }

    #[test]
    fn test_invalid_endpoint() {
        let bad = Credentials::new("a", "k", "s", "not a url");
        match sign_at(&bad, fixed_time()) {
            Err(SigningError::InvalidEndpoint { endpoint, .. }) => assert_eq!(endpoint, "not a url"),
            other => panic!("expected InvalidEndpoint, got {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_without_host() {
        let bad = Credentials::new("a", "k", "s", "unix:/run/speech.sock");
        assert!(matches!(
            sign_at(&bad, fixed_time()),
            Err(SigningError::MissingHost(_))
        ));
    }

    #[test]
    fn test_sign_uses_current_time() {
        let signed = sign(&creds()).unwrap();
        assert!(signed.date.ends_with(" GMT"));
        assert_eq!(signed.host, "ws-api.xfyun.cn");
    }
}
