//! Layered runtime settings for the STT gateway.
//!
//! Load order (lowest to highest precedence): built-in defaults →
//! `config/default.toml` → `config/{env}.toml` → `STT_GATEWAY_*`
//! environment variables (double-underscore separated for nesting, e.g.
//! `STT_GATEWAY_STT__STT_SAMPLE_RATE=16000`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level settings object. Held behind a lock by the server so
/// `/admin/reload-config` can swap it without a restart; new sessions read
/// the current value, live sessions keep the one they started with.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    #[serde(default)]
    pub cors_enabled: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_ws_path() -> String {
    "/v1/stt/ws".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}

/// Configuration consumed by the audio pipeline, recognizer adapter, and
/// Q/A extractor (§4.3, §4.4, §4.6, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,
    #[serde(default = "default_analysis_dir")]
    pub analysis_dir: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    #[serde(default = "default_rtc_sample_rate")]
    pub rtc_sample_rate: u32,
    #[serde(default = "default_stt_sample_rate")]
    pub stt_sample_rate: u32,
    #[serde(default = "default_rtc_language")]
    pub rtc_language: String,
    #[serde(default = "default_stt_model")]
    pub stt_model: String,
    #[serde(default)]
    pub stt_use_enhanced: bool,
    #[serde(default)]
    pub enable_denoise: bool,
    #[serde(default)]
    pub enable_speaker_diarization: bool,
    #[serde(default = "default_max_speakers")]
    pub max_speakers: i32,

    /// JSON array of ICE servers overriding the single default STUN server.
    /// Each entry is either a URL string or `{urls, username?, credential?}`.
    #[serde(default)]
    pub ice_servers_json: Option<String>,

    #[serde(default = "default_qa_time_window_sec")]
    pub qa_time_window_sec: f64,
    #[serde(default = "default_qa_sentence_window")]
    pub qa_sentence_window: usize,

    /// Path to a Google service-account JSON key. Absent => `GOOGLE_AUTH_MISSING`.
    #[serde(default)]
    pub recognizer_credentials_path: Option<String>,
    #[serde(default = "default_recognizer_endpoint")]
    pub recognizer_endpoint: String,
}

fn default_storage_dir() -> String {
    "data/recordings".to_string()
}
fn default_analysis_dir() -> String {
    "data/analysis".to_string()
}
fn default_logs_dir() -> String {
    "data/logs".to_string()
}
fn default_rtc_sample_rate() -> u32 {
    48_000
}
fn default_stt_sample_rate() -> u32 {
    16_000
}
fn default_rtc_language() -> String {
    "ko-KR".to_string()
}
fn default_stt_model() -> String {
    "default".to_string()
}
fn default_max_speakers() -> i32 {
    2
}
fn default_qa_time_window_sec() -> f64 {
    15.0
}
fn default_qa_sentence_window() -> usize {
    3
}
fn default_recognizer_endpoint() -> String {
    "speech.googleapis.com:443".to_string()
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            analysis_dir: default_analysis_dir(),
            logs_dir: default_logs_dir(),
            rtc_sample_rate: default_rtc_sample_rate(),
            stt_sample_rate: default_stt_sample_rate(),
            rtc_language: default_rtc_language(),
            stt_model: default_stt_model(),
            stt_use_enhanced: false,
            enable_denoise: true,
            enable_speaker_diarization: true,
            max_speakers: default_max_speakers(),
            ice_servers_json: None,
            qa_time_window_sec: default_qa_time_window_sec(),
            qa_sentence_window: default_qa_sentence_window(),
            recognizer_credentials_path: None,
            recognizer_endpoint: default_recognizer_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,
    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    vec!["127.0.0.1:9042".to_string()]
}
fn default_scylla_keyspace() -> String {
    "stt_gateway".to_string()
}
fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default)]
    pub tracing_enabled: bool,
}

fn default_log_level() -> String {
    "stt_gateway_server=info,tower_http=info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            otlp_endpoint: None,
            tracing_enabled: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every section, collecting every violated bound rather than
    /// stopping at the first. Returns `ConfigError::InvalidConfig` carrying
    /// one `InvalidValue` per violation when any section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Vec::new();
        violations.extend(self.validate_server());
        violations.extend(self.validate_stt());
        violations.extend(self.validate_persistence());

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::InvalidConfig(violations))
        }
    }

    fn validate_server(&self) -> Vec<ConfigError> {
        let mut violations = Vec::new();
        if self.server.port == 0 {
            violations.push(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "port cannot be 0".to_string(),
            });
        }
        if self.server.cors_enabled && self.environment.is_production() && self.server.cors_origins.is_empty()
        {
            violations.push(ConfigError::InvalidValue {
                field: "server.cors_origins".to_string(),
                message: "must list explicit origins when CORS is enabled in production".to_string(),
            });
        }
        violations
    }

    fn validate_stt(&self) -> Vec<ConfigError> {
        let stt = &self.stt;
        let mut violations = Vec::new();
        if stt.stt_sample_rate == 0 {
            violations.push(ConfigError::InvalidValue {
                field: "stt.stt_sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if stt.rtc_sample_rate == 0 {
            violations.push(ConfigError::InvalidValue {
                field: "stt.rtc_sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if stt.qa_time_window_sec <= 0.0 {
            violations.push(ConfigError::InvalidValue {
                field: "stt.qa_time_window_sec".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if stt.qa_sentence_window == 0 {
            violations.push(ConfigError::InvalidValue {
                field: "stt.qa_sentence_window".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if stt.storage_dir.is_empty() || stt.analysis_dir.is_empty() || stt.logs_dir.is_empty() {
            violations.push(ConfigError::InvalidValue {
                field: "stt.storage_dir|analysis_dir|logs_dir".to_string(),
                message: "directories must not be empty".to_string(),
            });
        }
        if let Some(json) = &stt.ice_servers_json {
            if serde_json::from_str::<serde_json::Value>(json).is_err() {
                violations.push(ConfigError::InvalidValue {
                    field: "stt.ice_servers_json".to_string(),
                    message: "must be valid JSON".to_string(),
                });
            }
        }
        violations
    }

    fn validate_persistence(&self) -> Vec<ConfigError> {
        let mut violations = Vec::new();
        if self.persistence.enabled && self.persistence.scylla_hosts.is_empty() {
            violations.push(ConfigError::InvalidValue {
                field: "persistence.scylla_hosts".to_string(),
                message: "must list at least one host when persistence is enabled".to_string(),
            });
        }
        if self.persistence.replication_factor == 0 {
            violations.push(ConfigError::InvalidValue {
                field: "persistence.replication_factor".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        violations
    }

    /// Ensures the configured directories exist, creating them if necessary.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.stt.storage_dir)?;
        std::fs::create_dir_all(&self.stt.analysis_dir)?;
        std::fs::create_dir_all(&self.stt.logs_dir)?;
        Ok(())
    }
}

/// Loads settings from `config/default.{toml}`, an optional
/// `config/{env}.toml` override, then `STT_GATEWAY_*` environment variables,
/// and validates the result.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();
    builder = builder.add_source(File::with_name("config/default").required(false));
    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }
    builder = builder.add_source(
        Environment::with_prefix("STT_GATEWAY")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let mut settings = Settings::default();
        settings.stt.stt_sample_rate = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn malformed_ice_servers_json_is_rejected() {
        let mut settings = Settings::default();
        settings.stt.ice_servers_json = Some("not json".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn every_violated_bound_is_reported_not_just_the_first() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        settings.stt.stt_sample_rate = 0;
        settings.stt.qa_sentence_window = 0;
        settings.persistence.replication_factor = 0;

        let err = settings.validate().unwrap_err();
        let ConfigError::InvalidConfig(violations) = err else {
            panic!("expected InvalidConfig, got {err:?}");
        };
        assert_eq!(violations.len(), 4);
    }
}
