use crate::error::ConfigError;
use crate::types::Credentials;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// Environment variable holding an inline TOML config. Takes precedence over the config file.
pub const CONFIG_ENV_VAR: &str = "XFSPEECH_CONFIG";

pub const DEFAULT_IAT_ENDPOINT: &str = "wss://ws-api.xfyun.cn/v2/iat";
pub const DEFAULT_TTS_ENDPOINT: &str = "wss://ws-api.xfyun.cn/v2/tts";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub iat: Option<IatConfig>,

    #[serde(default)]
    pub tts: Option<TtsConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Dictation (speech-to-text) account and protocol options.
#[derive(Debug, Deserialize, Clone)]
pub struct IatConfig {
    pub app_id: String,
    pub api_key: String,
    pub api_secret: String,

    #[serde(default = "default_iat_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause between outbound audio frames.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_accent")]
    pub accent: String,

    #[serde(default = "default_vinfo")]
    pub vinfo: u8,

    /// Server-side end-of-speech silence threshold.
    #[serde(default = "default_vad_eos_ms")]
    pub vad_eos_ms: u32,
}

/// Synthesis (text-to-speech) account and protocol options.
#[derive(Debug, Deserialize, Clone)]
pub struct TtsConfig {
    pub app_id: String,
    pub api_key: String,
    pub api_secret: String,

    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl IatConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.app_id, &self.api_key, &self.api_secret, &self.endpoint)
    }
}

impl TtsConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.app_id, &self.api_key, &self.api_secret, &self.endpoint)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_iat_endpoint() -> String {
    DEFAULT_IAT_ENDPOINT.to_string()
}

fn default_tts_endpoint() -> String {
    DEFAULT_TTS_ENDPOINT.to_string()
}

fn default_chunk_size() -> usize {
    1280
}

fn default_frame_interval_ms() -> u64 {
    40
}

fn default_domain() -> String {
    "iat".to_string()
}

fn default_language() -> String {
    "zh_cn".to_string()
}

fn default_accent() -> String {
    "mandarin".to_string()
}

fn default_vinfo() -> u8 {
    1
}

fn default_vad_eos_ms() -> u32 {
    10000
}

fn default_voice() -> String {
    "xiaoyan".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = input.to_string();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => result = result.replace(&cap[0], &val),
            Err(_) => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
        }
    }

    Ok(result)
}

fn check_account(
    section: &str,
    app_id: &str,
    api_key: &str,
    api_secret: &str,
) -> Result<(), ConfigError> {
    let fields = [
        ("app_id", app_id),
        ("api_key", api_key),
        ("api_secret", api_secret),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("[{section}] {field} is empty")));
        }
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Use the inline config in [`CONFIG_ENV_VAR`] when it is set, otherwise read `path`.
    pub fn from_env_or_file(path: &Path) -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(inline) if !inline.trim().is_empty() => {
                tracing::debug!("reading config from ${CONFIG_ENV_VAR}");
                Self::from_toml_str(&inline)
            }
            _ => {
                tracing::debug!(path = %path.display(), "reading config file");
                Self::load_from_file(path)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(iat) = &self.iat {
            check_account("iat", &iat.app_id, &iat.api_key, &iat.api_secret)?;
            if iat.chunk_size == 0 {
                return Err(ConfigError::Invalid(
                    "[iat] chunk_size must be positive".to_string(),
                ));
            }
        }
        if let Some(tts) = &self.tts {
            check_account("tts", &tts.app_id, &tts.api_key, &tts.api_secret)?;
            if tts.sample_rate == 0 {
                return Err(ConfigError::Invalid(
                    "[tts] sample_rate must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[general]
log_level = "debug"

[iat]
app_id = "app1"
api_key = "key1"
api_secret = "secret1"
endpoint = "wss://iat-api.xfyun.cn/v2/iat"
chunk_size = 640
frame_interval_ms = 400
language = "en_us"
vad_eos_ms = 3000

[tts]
app_id = "app2"
api_key = "key2"
api_secret = "secret2"
voice = "aisjiuxu"
sample_rate = 8000
"#;

    #[test]
    fn test_config_parse_valid_toml() {
        let config = AppConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.general.log_level, "debug");

        let iat = config.iat.unwrap();
        assert_eq!(iat.app_id, "app1");
        assert_eq!(iat.endpoint, "wss://iat-api.xfyun.cn/v2/iat");
        assert_eq!(iat.chunk_size, 640);
        assert_eq!(iat.frame_interval_ms, 400);
        assert_eq!(iat.language, "en_us");
        assert_eq!(iat.accent, "mandarin");
        assert_eq!(iat.vad_eos_ms, 3000);

        let tts = config.tts.unwrap();
        assert_eq!(tts.app_id, "app2");
        assert_eq!(tts.endpoint, DEFAULT_TTS_ENDPOINT);
        assert_eq!(tts.voice, "aisjiuxu");
        assert_eq!(tts.sample_rate, 8000);
    }

    #[test]
    fn test_config_default_values() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert!(config.iat.is_none());
        assert!(config.tts.is_none());
    }

    #[test]
    fn test_config_iat_defaults() {
        let toml_str = r#"
[iat]
app_id = "a"
api_key = "k"
api_secret = "s"
"#;
        let iat = AppConfig::from_toml_str(toml_str).unwrap().iat.unwrap();
        assert_eq!(iat.endpoint, DEFAULT_IAT_ENDPOINT);
        assert_eq!(iat.chunk_size, 1280);
        assert_eq!(iat.frame_interval_ms, 40);
        assert_eq!(iat.domain, "iat");
        assert_eq!(iat.language, "zh_cn");
        assert_eq!(iat.accent, "mandarin");
        assert_eq!(iat.vinfo, 1);
        assert_eq!(iat.vad_eos_ms, 10000);
    }

    #[test]
    fn test_config_missing_credentials_is_parse_error() {
        let toml_str = r#"
[tts]
app_id = "a"
"#;
        assert!(matches!(
            AppConfig::from_toml_str(toml_str),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_config_env_var_interpolation() {
        std::env::set_var("XFSPEECH_TEST_SECRET", "s3cr3t");
        let toml_str = r#"
[iat]
app_id = "a"
api_key = "k"
api_secret = "${XFSPEECH_TEST_SECRET}"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.iat.unwrap().api_secret, "s3cr3t");
        std::env::remove_var("XFSPEECH_TEST_SECRET");
    }

    #[test]
    fn test_config_missing_env_var_error() {
        let toml_str = r#"
[general]
log_level = "${DEFINITELY_DOES_NOT_EXIST_12345}"
"#;
        let err = AppConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("DEFINITELY_DOES_NOT_EXIST_12345"));
    }

    #[test]
    fn test_config_invalid_toml_error() {
        assert!(AppConfig::from_toml_str("this is not valid toml [[[").is_err());
    }

    #[test]
    fn test_config_credentials_carry_endpoint() {
        let config = AppConfig::from_toml_str(FULL).unwrap();
        let creds = config.tts.unwrap().credentials();
        assert_eq!(creds.app_id, "app2");
        assert_eq!(creds.api_key, "key2");
        assert_eq!(creds.api_secret, "secret2");
        assert_eq!(creds.endpoint, DEFAULT_TTS_ENDPOINT);
    }

    #[test]
    fn test_config_validate_accepts_full() {
        let config = AppConfig::from_toml_str(FULL).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_rejects_empty_secret() {
        let toml_str = r#"
[iat]
app_id = "a"
api_key = "k"
api_secret = "  "
"#;
        let err = AppConfig::from_toml_str(toml_str).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("api_secret"));
    }

    #[test]
    fn test_config_validate_rejects_zero_chunk_size() {
        let toml_str = r#"
[iat]
app_id = "a"
api_key = "k"
api_secret = "s"
chunk_size = 0
"#;
        let err = AppConfig::from_toml_str(toml_str).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = std::env::temp_dir().join("xfspeech_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.iat.unwrap().chunk_size, 640);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_config_env_overrides_file() {
        std::env::set_var(CONFIG_ENV_VAR, "[general]\nlog_level = \"trace\"\n");
        let config = AppConfig::from_env_or_file(Path::new("/nonexistent/path.toml")).unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);
        assert_eq!(config.general.log_level, "trace");
    }

    #[test]
    fn test_config_load_from_file_not_found() {
        let result = AppConfig::load_from_file(Path::new("/nonexistent/path.toml"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("failed to read config file"));
    }
}
