//! Language model integration
//!
//! Two model roles share one backend: a small fast model classifies caller
//! intent against a fixed label set, a larger model generates the spoken
//! reply. The [`DialogueModel`] adapter implements the core
//! `LanguageModel` trait on top of any [`LlmBackend`].

pub mod adapter;
pub mod backend;
pub mod prompt;

use thiserror::Error;

pub use adapter::DialogueModel;
pub use backend::{AnthropicBackend, AnthropicConfig, LlmBackend, LlmRequest, LlmResponse};
pub use prompt::{Message, Role};

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for dialwave_core::Error {
    fn from(err: LlmError) -> Self {
        dialwave_core::Error::Provider(err.to_string())
    }
}
