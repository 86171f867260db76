//! Collaborator traits
//!
//! External boundaries implement these so components can be wired with real
//! providers in the binary and mocks in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::conversation::{ConversationState, Intent};
use crate::error::Result;
use crate::model::Contact;

/// Context handed to the intent classifier
#[derive(Debug, Clone)]
pub struct IntentContext {
    pub state: ConversationState,
    pub turn_count: u32,
}

/// One prior exchange, oldest first
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub user_input: String,
    pub bot_response: String,
}

/// Everything the reply generator needs for one turn
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    /// State the reply is spoken in
    pub state: ConversationState,
    /// Objective for that state, from the active script
    pub objective: String,
    /// Persona and company guidelines, from the active script
    pub persona: String,
    pub contact_name: String,
    pub company: String,
    pub history: Vec<HistoryTurn>,
    pub user_input: String,
}

/// Generated spoken reply
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub text: String,
    pub confidence: f32,
}

/// Language model collaborator
///
/// `classify_intent` must degrade to `Intent::Unknown` on malformed model
/// output rather than erroring; transport failures still propagate.
/// `generate_reply` propagates all failures so the webhook boundary can
/// apply the scripted-termination fallback.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn classify_intent(&self, utterance: &str, context: &IntentContext) -> Result<Intent>;

    async fn generate_reply(&self, request: &ReplyRequest) -> Result<GeneratedReply>;
}

/// Speech synthesis collaborator
///
/// Returns `None` when synthesis is unavailable, signalling the caller to
/// fall back to the provider's basic voice.
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    async fn synthesize(&self, text: &str, voice_profile: &str) -> Result<Option<String>>;
}

/// Details fetched from the voice provider after a call ends
#[derive(Debug, Clone, Default)]
pub struct ProviderCallDetails {
    pub duration_seconds: u32,
    pub status: String,
    pub price: Option<f64>,
    pub answered_by: Option<String>,
}

/// Telephony provider boundary
#[async_trait]
pub trait Telephony: Send + Sync {
    /// Place an outbound call; returns the provider's call reference
    async fn initiate_call(&self, contact: &Contact, call_id: Uuid) -> Result<String>;

    /// Send an SMS to the given phone number
    async fn send_message(&self, phone: &str, body: &str) -> Result<()>;

    /// Fetch post-call details (duration, price)
    async fn call_details(&self, external_ref: &str) -> Result<ProviderCallDetails>;

    /// Resolve a recording reference into a fetchable URL
    async fn recording_url(&self, recording_ref: &str) -> Result<String>;
}
