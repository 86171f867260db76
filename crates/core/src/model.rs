//! Persisted entity types
//!
//! These mirror the logical schema: campaigns own pacing and retry policy,
//! contacts carry DNC state, calls record one dial attempt end to end, and
//! turns are the append-only transcript of a call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::ConversationState;
use crate::error::{Error, Result};

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Retry policy copied onto every job a campaign enqueues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Initial backoff between attempts; doubles each retry
    pub delay_minutes: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_minutes: 1,
        }
    }
}

/// Outbound calling campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    /// Named script in the script library
    pub script_ref: String,
    pub retry_policy: RetryPolicy,
    /// Maximum calls queued per start batch; 0 means uncapped
    pub daily_call_cap: u32,
    /// Optional UTC-offset override (hours) for the calling window
    pub utc_offset_hours: Option<i8>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(name: impl Into<String>, script_ref: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: CampaignStatus::Draft,
            script_ref: script_ref.into(),
            retry_policy: RetryPolicy::default(),
            daily_call_cap: 0,
            utc_offset_hours: None,
            created_at: Utc::now(),
        }
    }
}

/// Contact pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Nurture,
    Disqualified,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Nurture => "nurture",
            Self::Disqualified => "disqualified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "qualified" => Some(Self::Qualified),
            "nurture" => Some(Self::Nurture),
            "disqualified" => Some(Self::Disqualified),
            _ => None,
        }
    }
}

/// A person reachable by phone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    /// Inbound callers may not belong to a campaign
    pub campaign_id: Option<Uuid>,
    /// Normalized E.164-like number
    pub phone: String,
    pub full_name: String,
    pub company: String,
    pub status: ContactStatus,
    pub dnc: bool,
    /// Optimistic dispatch lock; set via compare-and-swap before dialing
    pub last_dispatched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(phone: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: None,
            phone: phone.into(),
            full_name: full_name.into(),
            company: String::new(),
            status: ContactStatus::New,
            dnc: false,
            last_dispatched_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// Call lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Initiated,
    Queued,
    Ringing,
    InProgress,
    Completed,
    Voicemail,
    Failed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Queued => "queued",
            Self::Ringing => "ringing",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Voicemail => "voicemail",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initiated" => Some(Self::Initiated),
            "queued" => Some(Self::Queued),
            "ringing" => Some(Self::Ringing),
            "in_progress" | "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "voicemail" => Some(Self::Voicemail),
            "failed" | "busy" | "no-answer" | "canceled" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal calls are immutable; webhooks must never downgrade them
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Voicemail | Self::Failed)
    }
}

/// Per-provider cost breakdown in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CallCosts {
    pub telephony: f64,
    pub tts: f64,
    pub asr: f64,
    pub llm: f64,
}

impl CallCosts {
    pub fn total(&self) -> f64 {
        self.telephony + self.tts + self.asr + self.llm
    }
}

/// One dial attempt, inbound or outbound
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub direction: CallDirection,
    pub status: CallStatus,
    /// Provider-side call reference
    pub external_ref: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: u32,
    pub costs: CallCosts,
    pub outcome: Option<String>,
    pub recording_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Call {
    pub fn outbound(contact_id: Uuid, campaign_id: Option<Uuid>) -> Self {
        Self::new(contact_id, campaign_id, CallDirection::Outbound)
    }

    pub fn inbound(contact_id: Uuid) -> Self {
        Self::new(contact_id, None, CallDirection::Inbound)
    }

    fn new(contact_id: Uuid, campaign_id: Option<Uuid>, direction: CallDirection) -> Self {
        Self {
            id: Uuid::new_v4(),
            contact_id,
            campaign_id,
            direction,
            status: CallStatus::Initiated,
            external_ref: None,
            started_at: None,
            ended_at: None,
            duration_seconds: 0,
            costs: CallCosts::default(),
            outcome: None,
            recording_url: None,
            created_at: Utc::now(),
        }
    }
}

/// One utterance/reply exchange within a call; append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub call_id: Uuid,
    /// 1-based, contiguous per call
    pub turn_number: u32,
    pub state: ConversationState,
    pub user_input: String,
    pub bot_response: String,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

/// Do-not-call ledger entry; append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DncEntry {
    pub phone: String,
    pub reason: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Normalize a raw phone number into E.164-like form
///
/// Ten-digit numbers are assumed to be NANP and get a +1 prefix.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if !(10..=15).contains(&digits.len()) {
        return Err(Error::Validation(format!(
            "phone number must have 10-15 digits, got {}",
            digits.len()
        )));
    }

    if raw.trim_start().starts_with('+') {
        return Ok(format!("+{digits}"));
    }
    if digits.len() == 10 {
        return Ok(format!("+1{digits}"));
    }
    Ok(format!("+{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_nanp_numbers() {
        assert_eq!(normalize_phone("(913) 555-0142").unwrap(), "+19135550142");
        assert_eq!(normalize_phone("913-555-0142").unwrap(), "+19135550142");
        assert_eq!(normalize_phone("+19135550142").unwrap(), "+19135550142");
        assert_eq!(normalize_phone("+44 20 7946 0958").unwrap(), "+442079460958");
    }

    #[test]
    fn rejects_short_numbers() {
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(CallStatus::Completed.is_terminal());
        assert!(CallStatus::Voicemail.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(!CallStatus::InProgress.is_terminal());
        assert!(!CallStatus::Queued.is_terminal());
    }

    #[test]
    fn status_round_trips() {
        for status in [
            CallStatus::Initiated,
            CallStatus::Queued,
            CallStatus::Ringing,
            CallStatus::InProgress,
            CallStatus::Completed,
            CallStatus::Voicemail,
            CallStatus::Failed,
        ] {
            assert_eq!(CallStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CallStatus::parse("no-answer"), Some(CallStatus::Failed));
    }
}
