//! Main settings module
//!
//! Priority: env vars > config/{env}.yaml > config/default.yaml > defaults.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Runtime environment
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

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub telephony: TelephonySettings,

    #[serde(default)]
    pub speech: SpeechSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub dispatch: DispatchSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub crm: CrmSettings,

    #[serde(default)]
    pub observability: ObservabilitySettings,

    /// Directory holding sales script YAML files
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: String,
}

fn default_scripts_dir() -> String {
    "config/scripts".to_string()
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
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

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}

/// Voice provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonySettings {
    #[serde(default = "default_telephony_endpoint")]
    pub endpoint: String,
    /// Provider account identifier
    #[serde(default)]
    pub account_sid: String,
    /// Provider auth token; usually injected via DIALWAVE__TELEPHONY__AUTH_TOKEN
    #[serde(default)]
    pub auth_token: String,
    /// Caller-id number in E.164 form
    #[serde(default)]
    pub from_number: String,
    /// Public base URL the provider posts webhooks to
    #[serde(default = "default_webhook_base")]
    pub webhook_base_url: String,
    /// Voice used when synthesis is unavailable
    #[serde(default = "default_fallback_voice")]
    pub fallback_voice: String,
    #[serde(default = "default_price_per_minute")]
    pub price_per_minute: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_telephony_endpoint() -> String {
    "https://api.twilio.com/2010-04-01".to_string()
}

fn default_webhook_base() -> String {
    "http://localhost:8080".to_string()
}

fn default_fallback_voice() -> String {
    "Polly.Joanna".to_string()
}

fn default_price_per_minute() -> f64 {
    0.0085
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for TelephonySettings {
    fn default() -> Self {
        Self {
            endpoint: default_telephony_endpoint(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            webhook_base_url: default_webhook_base(),
            fallback_voice: default_fallback_voice(),
            price_per_minute: default_price_per_minute(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Speech synthesis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    /// When disabled, calls use the provider's fallback voice
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_speech_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_voice_profile")]
    pub voice_profile: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_speech_endpoint() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}

fn default_voice_profile() -> String {
    "rachel".to_string()
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_speech_endpoint(),
            api_key: String::new(),
            voice_profile: default_voice_profile(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    /// Usually injected via DIALWAVE__LLM__API_KEY or ANTHROPIC_API_KEY
    #[serde(default)]
    pub api_key: String,
    /// Small fast model for intent classification
    #[serde(default = "default_classify_model")]
    pub classify_model: String,
    /// Larger model for reply generation
    #[serde(default = "default_reply_model")]
    pub reply_model: String,
    #[serde(default = "default_reply_max_tokens")]
    pub reply_max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_llm_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_classify_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_reply_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_reply_max_tokens() -> usize {
    150
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            classify_model: default_classify_model(),
            reply_model: default_reply_model(),
            reply_max_tokens: default_reply_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

/// Dispatch pacing and compliance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// First hour of the local calling window (inclusive)
    #[serde(default = "default_calling_hour_start")]
    pub calling_hour_start: u8,
    /// End hour of the local calling window (exclusive)
    #[serde(default = "default_calling_hour_end")]
    pub calling_hour_end: u8,
    /// Hours within which a prior call blocks a new dial
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    /// Contacts per start batch when no explicit list is given
    #[serde(default = "default_batch_cap")]
    pub batch_cap: usize,
    #[serde(default = "default_calls_per_minute")]
    pub default_calls_per_minute: u32,
    /// Delay applied when a job lands outside the calling window
    #[serde(default = "default_reschedule_minutes")]
    pub reschedule_delay_minutes: u32,
}

fn default_calling_hour_start() -> u8 {
    9
}

fn default_calling_hour_end() -> u8 {
    17
}

fn default_lookback_hours() -> u32 {
    24
}

fn default_batch_cap() -> usize {
    100
}

fn default_calls_per_minute() -> u32 {
    2
}

fn default_reschedule_minutes() -> u32 {
    60
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            calling_hour_start: default_calling_hour_start(),
            calling_hour_end: default_calling_hour_end(),
            lookback_hours: default_lookback_hours(),
            batch_cap: default_batch_cap(),
            default_calls_per_minute: default_calls_per_minute(),
            reschedule_delay_minutes: default_reschedule_minutes(),
        }
    }
}

/// Persistence settings (ScyllaDB)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// false = in-memory stores only
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    vec!["127.0.0.1:9042".to_string()]
}

fn default_keyspace() -> String {
    "dialwave".to_string()
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

/// CRM connector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmSettings {
    /// "http" or "noop"
    #[serde(default = "default_crm_provider")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub access_token: String,
    /// Sequence id used for nurture enrollment
    #[serde(default = "default_nurture_sequence")]
    pub nurture_sequence_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_crm_provider() -> String {
    "noop".to_string()
}

fn default_nurture_sequence() -> String {
    "media_services_nurture".to_string()
}

impl Default for CrmSettings {
    fn default() -> Self {
        Self {
            provider: default_crm_provider(),
            endpoint: String::new(),
            access_token: String::new(),
            nurture_sequence_id: default_nurture_sequence(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub log_json: bool,
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_filter() -> String {
    "info,dialwave=debug".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_json: false,
            log_filter: default_log_filter(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Load settings from config files and environment
///
/// Reads `config/default.yaml`, then `config/{env}.yaml` when `env` is
/// given, then `DIALWAVE__`-prefixed environment variables (`__` separates
/// nesting, e.g. `DIALWAVE__SERVER__PORT=9090`).
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if Path::new("config/default.yaml").exists() {
        builder = builder.add_source(File::with_name("config/default"));
    }

    if let Some(env_name) = env {
        let env_file = format!("config/{env_name}");
        if Path::new(&format!("{env_file}.yaml")).exists() {
            builder = builder.add_source(File::with_name(&env_file));
        } else {
            tracing::warn!(env = %env_name, "no config file for environment, skipping");
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("DIALWAVE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let settings = builder.build()?.try_deserialize()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let settings = Settings::default();
        assert_eq!(settings.dispatch.calling_hour_start, 9);
        assert_eq!(settings.dispatch.calling_hour_end, 17);
        assert_eq!(settings.dispatch.lookback_hours, 24);
        assert_eq!(settings.dispatch.batch_cap, 100);
        assert_eq!(settings.dispatch.default_calls_per_minute, 2);
        assert!(!settings.persistence.enabled);
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn load_without_files_uses_defaults() {
        let settings = load_settings(None).expect("defaults should load");
        assert_eq!(settings.persistence.keyspace, "dialwave");
    }
}
