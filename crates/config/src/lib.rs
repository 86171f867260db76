//! Configuration management for the dialwave call platform
//!
//! Two layers of configuration:
//! - [`Settings`]: runtime settings (server, providers, dispatch pacing,
//!   persistence) loaded from files and environment variables
//! - [`ScriptLibrary`]: sales scripts (persona, per-state objectives,
//!   scripted lines, SMS templates) loaded from YAML

pub mod script;
pub mod settings;

use thiserror::Error;

pub use script::{SalesScript, ScriptLibrary};
pub use settings::{
    load_settings, CrmSettings, DispatchSettings, LlmSettings, ObservabilitySettings,
    PersistenceSettings, RuntimeEnvironment, ServerSettings, Settings, SpeechSettings,
    TelephonySettings,
};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("script error: {0}")]
    Script(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
