//! External system integrations
//!
//! CRM sync is best-effort by contract: every operation here may fail
//! without affecting the qualification result that triggered it. Callers
//! log failures and move on.

pub mod crm;

pub use crm::{CrmConnector, CrmContact, CrmDeal, HttpCrmConnector, NoopCrm};

use thiserror::Error;

/// Integration errors
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limited")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for IntegrationError {
    fn from(err: reqwest::Error) -> Self {
        IntegrationError::ConnectionFailed(err.to_string())
    }
}
