//! Core types and traits for the dialwave call platform
//!
//! This crate provides the foundational pieces shared by all other crates:
//! - Persisted entity types (campaigns, contacts, calls, turns, DNC entries)
//! - The conversation state machine data (states, intents, transitions)
//! - Typed qualification schema and the lead-score input
//! - Collaborator traits for pluggable backends (LLM, telephony, speech)
//! - Error taxonomy and clock abstraction

pub mod clock;
pub mod compliance;
pub mod conversation;
pub mod error;
pub mod model;
pub mod qualification;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use compliance::{Eligibility, EligibilityReason};
pub use conversation::{ConversationState, EngineAction, Intent};
pub use error::{Error, Result};
pub use model::{
    normalize_phone, Call, CallCosts, CallDirection, CallStatus, Campaign, CampaignStatus,
    Contact, ContactStatus, DncEntry, RetryPolicy, Turn,
};
pub use qualification::{BudgetRange, QualificationData, QualificationUpdate, Timeline};
pub use traits::{
    GeneratedReply, HistoryTurn, IntentContext, LanguageModel, ProviderCallDetails, ReplyRequest,
    SpeechSynthesis, Telephony,
};
