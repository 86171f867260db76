//! HTTP server for the dialwave call platform
//!
//! Two surfaces share one router: the campaign control API consumed by the
//! operator dashboard, and the webhook endpoints the voice provider posts
//! call events to.

pub mod error;
pub mod http;
pub mod metrics;
pub mod state;
pub mod webhooks;

pub use error::ServerError;
pub use http::create_router;
pub use metrics::init_metrics;
pub use state::AppState;
