//! Telephony boundary
//!
//! HTTP client for the voice provider, call-control payload rendering for
//! webhook responses, and the speech synthesis collaborator.

pub mod callcontrol;
pub mod client;
pub mod speech;

use thiserror::Error;

pub use callcontrol::{
    play_and_gather, speak_and_gather, terminal_message, CallControl,
};
pub use client::{calculate_call_cost, VoiceClient, VoiceClientConfig};
pub use speech::{AudioCache, HttpSpeechClient, NoopSpeech};

/// Telephony errors
#[derive(Error, Debug)]
pub enum TelephonyError {
    #[error("provider API error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for TelephonyError {
    fn from(err: reqwest::Error) -> Self {
        TelephonyError::Network(err.to_string())
    }
}

impl From<TelephonyError> for dialwave_core::Error {
    fn from(err: TelephonyError) -> Self {
        dialwave_core::Error::Provider(err.to_string())
    }
}
