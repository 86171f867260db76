//! Store traits per entity
//!
//! All traits return core results so consumers stay independent of the
//! backing implementation. Mutation discipline is per-row upserts; there is
//! no multi-row transaction.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use dialwave_core::{
    Call, Campaign, CampaignStatus, Contact, ContactStatus, DncEntry, QualificationData, Result,
    Turn,
};

/// Campaign records
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Campaign>>;

    async fn upsert(&self, campaign: &Campaign) -> Result<()>;

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> Result<()>;

    async fn list(&self) -> Result<Vec<Campaign>>;
}

/// Contact records
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Contact>>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>>;

    async fn upsert(&self, contact: &Contact) -> Result<()>;

    async fn set_status(&self, id: Uuid, status: ContactStatus) -> Result<()>;

    async fn set_dnc(&self, id: Uuid, dnc: bool) -> Result<()>;

    /// Fetch contacts by id, preserving input order; unknown ids are skipped
    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Contact>>;

    async fn list_by_status(&self, status: ContactStatus, limit: usize) -> Result<Vec<Contact>>;

    async fn count_by_status(
        &self,
        campaign_id: Option<Uuid>,
        status: ContactStatus,
    ) -> Result<usize>;

    /// Optimistic dispatch claim: atomically set `last_dispatched_at = now`
    /// only if the current value is unset or older than `min_gap`. Returns
    /// false when another dispatcher already claimed the contact.
    async fn try_mark_dispatched(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        min_gap: Duration,
    ) -> Result<bool>;

    /// Release a dispatch claim after a failed dial so the retry can
    /// re-claim the contact
    async fn clear_dispatch_claim(&self, id: Uuid) -> Result<()>;
}

/// Call records
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Call>>;

    async fn upsert(&self, call: &Call) -> Result<()>;

    /// Most recent call for a contact created at or after `since`,
    /// excluding failed dial attempts (those never reached the contact)
    async fn latest_since(&self, contact_id: Uuid, since: DateTime<Utc>)
        -> Result<Option<Call>>;

    /// Calls in a non-terminal status
    async fn list_active(&self) -> Result<Vec<Call>>;

    async fn list_by_campaign(&self, campaign_id: Uuid) -> Result<Vec<Call>>;
}

/// Turn records; append-only
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Append a turn. Returns false when `(call_id, turn_number)` already
    /// exists, which callers treat as a duplicate webhook delivery.
    async fn append(&self, turn: &Turn) -> Result<bool>;

    async fn get(&self, call_id: Uuid, turn_number: u32) -> Result<Option<Turn>>;

    /// All turns for a call, ordered by turn number
    async fn list(&self, call_id: Uuid) -> Result<Vec<Turn>>;

    async fn count(&self, call_id: Uuid) -> Result<u32>;
}

/// Qualification records, one per contact
#[async_trait]
pub trait QualificationStore: Send + Sync {
    async fn get(&self, contact_id: Uuid) -> Result<Option<QualificationData>>;

    async fn upsert(&self, data: &QualificationData) -> Result<()>;
}

/// Do-not-call ledger; append-only
#[async_trait]
pub trait DncStore: Send + Sync {
    async fn contains(&self, phone: &str) -> Result<bool>;

    async fn add(&self, entry: &DncEntry) -> Result<()>;
}
