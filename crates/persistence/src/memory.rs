//! In-memory store implementations
//!
//! Used as the development fallback when ScyllaDB is disabled and as the
//! backing for tests. Concurrency discipline matches the real stores:
//! per-row upserts, compare-and-swap for the dispatch claim.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use dialwave_core::{
    Call, CallStatus, Campaign, CampaignStatus, Contact, ContactStatus, DncEntry, Error,
    QualificationData, Result, Turn,
};

use crate::store::{
    CallStore, CampaignStore, ContactStore, DncStore, QualificationStore, TurnStore,
};

/// In-memory campaign store
#[derive(Default)]
pub struct InMemoryCampaignStore {
    rows: DashMap<Uuid, Campaign>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn get(&self, id: Uuid) -> Result<Option<Campaign>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    async fn upsert(&self, campaign: &Campaign) -> Result<()> {
        self.rows.insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> Result<()> {
        match self.rows.get_mut(&id) {
            Some(mut row) => {
                row.status = status;
                Ok(())
            }
            None => Err(Error::not_found("campaign", id.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Campaign>> {
        Ok(self.rows.iter().map(|r| r.clone()).collect())
    }
}

/// In-memory contact store
#[derive(Default)]
pub struct InMemoryContactStore {
    rows: DashMap<Uuid, Contact>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn get(&self, id: Uuid) -> Result<Option<Contact>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>> {
        Ok(self
            .rows
            .iter()
            .find(|r| r.phone == phone)
            .map(|r| r.clone()))
    }

    async fn upsert(&self, contact: &Contact) -> Result<()> {
        self.rows.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ContactStatus) -> Result<()> {
        match self.rows.get_mut(&id) {
            Some(mut row) => {
                row.status = status;
                Ok(())
            }
            None => Err(Error::not_found("contact", id.to_string())),
        }
    }

    async fn set_dnc(&self, id: Uuid, dnc: bool) -> Result<()> {
        match self.rows.get_mut(&id) {
            Some(mut row) => {
                row.dnc = dnc;
                Ok(())
            }
            None => Err(Error::not_found("contact", id.to_string())),
        }
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Contact>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.rows.get(id).map(|r| r.clone()))
            .collect())
    }

    async fn list_by_status(&self, status: ContactStatus, limit: usize) -> Result<Vec<Contact>> {
        let mut contacts: Vec<Contact> = self
            .rows
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.clone())
            .collect();
        // Deterministic order for pacing tests and repeatable batches
        contacts.sort_by_key(|c| (c.created_at, c.id));
        contacts.truncate(limit);
        Ok(contacts)
    }

    async fn count_by_status(
        &self,
        campaign_id: Option<Uuid>,
        status: ContactStatus,
    ) -> Result<usize> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.status == status)
            .filter(|r| campaign_id.is_none() || r.campaign_id == campaign_id)
            .count())
    }

    async fn try_mark_dispatched(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        min_gap: Duration,
    ) -> Result<bool> {
        // The entry guard serializes concurrent claims for the same contact
        let Some(mut row) = self.rows.get_mut(&id) else {
            return Err(Error::not_found("contact", id.to_string()));
        };
        if let Some(last) = row.last_dispatched_at {
            if now - last < min_gap {
                return Ok(false);
            }
        }
        row.last_dispatched_at = Some(now);
        Ok(true)
    }

    async fn clear_dispatch_claim(&self, id: Uuid) -> Result<()> {
        match self.rows.get_mut(&id) {
            Some(mut row) => {
                row.last_dispatched_at = None;
                Ok(())
            }
            None => Err(Error::not_found("contact", id.to_string())),
        }
    }
}

/// In-memory call store
#[derive(Default)]
pub struct InMemoryCallStore {
    rows: DashMap<Uuid, Call>,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallStore for InMemoryCallStore {
    async fn get(&self, id: Uuid) -> Result<Option<Call>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    async fn upsert(&self, call: &Call) -> Result<()> {
        self.rows.insert(call.id, call.clone());
        Ok(())
    }

    async fn latest_since(
        &self,
        contact_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<Call>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| {
                r.contact_id == contact_id
                    && r.created_at >= since
                    && r.status != CallStatus::Failed
            })
            .max_by_key(|r| r.created_at)
            .map(|r| r.clone()))
    }

    async fn list_active(&self) -> Result<Vec<Call>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| !r.status.is_terminal())
            .map(|r| r.clone())
            .collect())
    }

    async fn list_by_campaign(&self, campaign_id: Uuid) -> Result<Vec<Call>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.campaign_id == Some(campaign_id))
            .map(|r| r.clone())
            .collect())
    }
}

/// In-memory turn store keyed by call
#[derive(Default)]
pub struct InMemoryTurnStore {
    rows: DashMap<Uuid, Vec<Turn>>,
}

impl InMemoryTurnStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TurnStore for InMemoryTurnStore {
    async fn append(&self, turn: &Turn) -> Result<bool> {
        let mut turns = self.rows.entry(turn.call_id).or_default();
        if turns.iter().any(|t| t.turn_number == turn.turn_number) {
            return Ok(false);
        }
        turns.push(turn.clone());
        turns.sort_by_key(|t| t.turn_number);
        Ok(true)
    }

    async fn get(&self, call_id: Uuid, turn_number: u32) -> Result<Option<Turn>> {
        Ok(self.rows.get(&call_id).and_then(|turns| {
            turns
                .iter()
                .find(|t| t.turn_number == turn_number)
                .cloned()
        }))
    }

    async fn list(&self, call_id: Uuid) -> Result<Vec<Turn>> {
        Ok(self
            .rows
            .get(&call_id)
            .map(|turns| turns.clone())
            .unwrap_or_default())
    }

    async fn count(&self, call_id: Uuid) -> Result<u32> {
        Ok(self.rows.get(&call_id).map(|t| t.len() as u32).unwrap_or(0))
    }
}

/// In-memory qualification store
#[derive(Default)]
pub struct InMemoryQualificationStore {
    rows: DashMap<Uuid, QualificationData>,
}

impl InMemoryQualificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QualificationStore for InMemoryQualificationStore {
    async fn get(&self, contact_id: Uuid) -> Result<Option<QualificationData>> {
        Ok(self.rows.get(&contact_id).map(|r| r.clone()))
    }

    async fn upsert(&self, data: &QualificationData) -> Result<()> {
        self.rows.insert(data.contact_id, data.clone());
        Ok(())
    }
}

/// In-memory DNC ledger
#[derive(Default)]
pub struct InMemoryDncStore {
    rows: DashMap<String, DncEntry>,
}

impl InMemoryDncStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DncStore for InMemoryDncStore {
    async fn contains(&self, phone: &str) -> Result<bool> {
        Ok(self.rows.contains_key(phone))
    }

    async fn add(&self, entry: &DncEntry) -> Result<()> {
        // First write wins; the ledger is append-only
        self.rows
            .entry(entry.phone.clone())
            .or_insert_with(|| entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialwave_core::ConversationState;

    #[tokio::test]
    async fn turn_append_rejects_duplicates() {
        let store = InMemoryTurnStore::new();
        let call_id = Uuid::new_v4();
        let turn = Turn {
            call_id,
            turn_number: 1,
            state: ConversationState::Greeting,
            user_input: String::new(),
            bot_response: "Hello!".to_string(),
            confidence: 0.85,
            created_at: Utc::now(),
        };

        assert!(store.append(&turn).await.unwrap());
        assert!(!store.append(&turn).await.unwrap());
        assert_eq!(store.count(call_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn turns_list_in_order() {
        let store = InMemoryTurnStore::new();
        let call_id = Uuid::new_v4();
        for n in [2u32, 1, 3] {
            let turn = Turn {
                call_id,
                turn_number: n,
                state: ConversationState::Qualify,
                user_input: format!("input {n}"),
                bot_response: format!("reply {n}"),
                confidence: 0.9,
                created_at: Utc::now(),
            };
            store.append(&turn).await.unwrap();
        }
        let numbers: Vec<u32> = store
            .list(call_id)
            .await
            .unwrap()
            .iter()
            .map(|t| t.turn_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn dispatch_claim_is_exclusive_within_gap() {
        let store = InMemoryContactStore::new();
        let contact = Contact::new("+19135550142", "Dana Reeve");
        store.upsert(&contact).await.unwrap();

        let now = Utc::now();
        let gap = Duration::hours(24);
        assert!(store.try_mark_dispatched(contact.id, now, gap).await.unwrap());
        assert!(!store.try_mark_dispatched(contact.id, now, gap).await.unwrap());

        // After the gap passes the claim is available again
        let later = now + Duration::hours(25);
        assert!(store.try_mark_dispatched(contact.id, later, gap).await.unwrap());
    }

    #[tokio::test]
    async fn dnc_ledger_keeps_first_entry() {
        let store = InMemoryDncStore::new();
        let first = DncEntry {
            phone: "+19135550142".to_string(),
            reason: "sms_opt_out".to_string(),
            source: "sms".to_string(),
            created_at: Utc::now(),
        };
        let second = DncEntry {
            reason: "verbal_request".to_string(),
            ..first.clone()
        };
        store.add(&first).await.unwrap();
        store.add(&second).await.unwrap();
        assert!(store.contains("+19135550142").await.unwrap());
    }
}
