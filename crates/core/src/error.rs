//! Error taxonomy shared across the platform
//!
//! The variants map to distinct propagation policies: compliance skips are
//! permanent and never retried, scheduling conflicts are rescheduled without
//! consuming a retry attempt, provider errors are retried at dispatch time
//! and converted to a scripted termination mid-call.

use thiserror::Error;

use crate::compliance::EligibilityReason;

/// Platform-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Platform errors
#[derive(Error, Debug)]
pub enum Error {
    /// Contact may not be called; permanent for this dispatch, never retried
    #[error("compliance violation: {0}")]
    Compliance(EligibilityReason),

    /// Current time is outside the configured calling window; the caller
    /// should reschedule rather than fail
    #[error("outside calling hours")]
    OutsideCallingHours,

    /// A telephony/model/speech provider call failed
    #[error("provider error: {0}")]
    Provider(String),

    /// A referenced record does not exist; fatal for the request
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Malformed payload, rejected before any side effect
    #[error("validation error: {0}")]
    Validation(String),

    /// Persistent store failure
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Construct a not-found error for an entity kind and id
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error should be retried by the job queue
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::Store(_))
    }
}
