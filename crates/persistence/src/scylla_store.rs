//! ScyllaDB store implementations
//!
//! Per-row upserts only. The dispatch claim and turn append use lightweight
//! transactions so concurrent workers cannot double-claim a contact or
//! double-write a turn number.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use scylla::frame::response::result::CqlValue;
use scylla::QueryResult;
use uuid::Uuid;

use dialwave_core::{
    BudgetRange, Call, CallCosts, CallDirection, CallStatus, Campaign, CampaignStatus, Contact,
    ContactStatus, ConversationState, DncEntry, Error, QualificationData, Result, RetryPolicy,
    Timeline, Turn,
};

use crate::client::ScyllaClient;
use crate::error::PersistenceError;
use crate::store::{
    CallStore, CampaignStore, ContactStore, DncStore, QualificationStore, TurnStore,
};

/// Check the `[applied]` column of a lightweight-transaction result
fn lwt_applied(result: &QueryResult) -> bool {
    result
        .rows
        .as_ref()
        .and_then(|rows| rows.first())
        .and_then(|row| row.columns.first())
        .and_then(|col| col.as_ref())
        .map(|v| matches!(v, CqlValue::Boolean(true)))
        .unwrap_or(false)
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Utc::now)
}

fn parse_enum<T>(value: &str, parse: impl Fn(&str) -> Option<T>, what: &str) -> Result<T> {
    parse(value).ok_or_else(|| {
        PersistenceError::InvalidData(format!("unknown {what}: {value}")).into()
    })
}

/// Campaigns table
pub struct ScyllaCampaignStore {
    client: ScyllaClient,
}

impl ScyllaCampaignStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_campaign(
        row: (
            Uuid,
            String,
            String,
            String,
            i32,
            i32,
            i32,
            Option<i32>,
            i64,
        ),
    ) -> Result<Campaign> {
        let (
            id,
            name,
            status,
            script_ref,
            retry_max_attempts,
            retry_delay_minutes,
            daily_call_cap,
            utc_offset_hours,
            created_at,
        ) = row;
        Ok(Campaign {
            id,
            name,
            status: parse_enum(&status, CampaignStatus::parse, "campaign status")?,
            script_ref,
            retry_policy: RetryPolicy {
                max_attempts: retry_max_attempts.max(1) as u32,
                delay_minutes: retry_delay_minutes.max(0) as u32,
            },
            daily_call_cap: daily_call_cap.max(0) as u32,
            utc_offset_hours: utc_offset_hours.map(|h| h as i8),
            created_at: from_millis(created_at),
        })
    }

    const COLUMNS: &'static str = "id, name, status, script_ref, retry_max_attempts, \
                                   retry_delay_minutes, daily_call_cap, utc_offset_hours, \
                                   created_at";
}

#[async_trait]
impl CampaignStore for ScyllaCampaignStore {
    async fn get(&self, id: Uuid) -> Result<Option<Campaign>> {
        let query = format!(
            "SELECT {} FROM {}.campaigns WHERE id = ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(query, (id,))
            .await
            .map_err(PersistenceError::from)?;

        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => {
                let typed = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                Ok(Some(Self::row_to_campaign(typed)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, campaign: &Campaign) -> Result<()> {
        let query = format!(
            "INSERT INTO {}.campaigns ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace(),
            Self::COLUMNS
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    campaign.id,
                    campaign.name.as_str(),
                    campaign.status.as_str(),
                    campaign.script_ref.as_str(),
                    campaign.retry_policy.max_attempts as i32,
                    campaign.retry_policy.delay_minutes as i32,
                    campaign.daily_call_cap as i32,
                    campaign.utc_offset_hours.map(|h| h as i32),
                    millis(campaign.created_at),
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> Result<()> {
        let query = format!(
            "UPDATE {}.campaigns SET status = ? WHERE id = ?",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(query, (status.as_str(), id))
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Campaign>> {
        let query = format!(
            "SELECT {} FROM {}.campaigns",
            Self::COLUMNS,
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(query, &[])
            .await
            .map_err(PersistenceError::from)?;

        let mut campaigns = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let typed = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                campaigns.push(Self::row_to_campaign(typed)?);
            }
        }
        Ok(campaigns)
    }
}

/// Contacts table
pub struct ScyllaContactStore {
    client: ScyllaClient,
}

type ContactRow = (
    Uuid,
    Option<Uuid>,
    String,
    String,
    String,
    String,
    bool,
    Option<i64>,
    i64,
);

impl ScyllaContactStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    const COLUMNS: &'static str = "id, campaign_id, phone, full_name, company, status, dnc, \
                                   last_dispatched_at, created_at";

    fn row_to_contact(row: ContactRow) -> Result<Contact> {
        let (id, campaign_id, phone, full_name, company, status, dnc, last_dispatched_at, created_at) =
            row;
        Ok(Contact {
            id,
            campaign_id,
            phone,
            full_name,
            company,
            status: parse_enum(&status, ContactStatus::parse, "contact status")?,
            dnc,
            last_dispatched_at: last_dispatched_at.map(from_millis),
            created_at: from_millis(created_at),
        })
    }

    async fn select_contacts(
        &self,
        query: String,
        values: impl scylla::serialize::row::SerializeRow,
    ) -> Result<Vec<Contact>> {
        let result = self
            .client
            .session()
            .query_unpaged(query, values)
            .await
            .map_err(PersistenceError::from)?;

        let mut contacts = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let typed: ContactRow = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                contacts.push(Self::row_to_contact(typed)?);
            }
        }
        Ok(contacts)
    }
}

#[async_trait]
impl ContactStore for ScyllaContactStore {
    async fn get(&self, id: Uuid) -> Result<Option<Contact>> {
        let query = format!(
            "SELECT {} FROM {}.contacts WHERE id = ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        Ok(self.select_contacts(query, (id,)).await?.into_iter().next())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>> {
        let query = format!(
            "SELECT {} FROM {}.contacts WHERE phone = ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        Ok(self
            .select_contacts(query, (phone,))
            .await?
            .into_iter()
            .next())
    }

    async fn upsert(&self, contact: &Contact) -> Result<()> {
        let query = format!(
            "INSERT INTO {}.contacts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace(),
            Self::COLUMNS
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    contact.id,
                    contact.campaign_id,
                    contact.phone.as_str(),
                    contact.full_name.as_str(),
                    contact.company.as_str(),
                    contact.status.as_str(),
                    contact.dnc,
                    contact.last_dispatched_at.map(millis),
                    millis(contact.created_at),
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ContactStatus) -> Result<()> {
        let query = format!(
            "UPDATE {}.contacts SET status = ? WHERE id = ?",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(query, (status.as_str(), id))
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn set_dnc(&self, id: Uuid, dnc: bool) -> Result<()> {
        let query = format!(
            "UPDATE {}.contacts SET dnc = ? WHERE id = ?",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(query, (dnc, id))
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Contact>> {
        let mut contacts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(contact) = self.get(*id).await? {
                contacts.push(contact);
            }
        }
        Ok(contacts)
    }

    async fn list_by_status(&self, status: ContactStatus, limit: usize) -> Result<Vec<Contact>> {
        let query = format!(
            "SELECT {} FROM {}.contacts WHERE status = ? LIMIT ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        self.select_contacts(query, (status.as_str(), limit as i32))
            .await
    }

    async fn count_by_status(
        &self,
        campaign_id: Option<Uuid>,
        status: ContactStatus,
    ) -> Result<usize> {
        let contacts = self.list_by_status(status, i32::MAX as usize).await?;
        Ok(contacts
            .iter()
            .filter(|c| campaign_id.is_none() || c.campaign_id == campaign_id)
            .count())
    }

    async fn try_mark_dispatched(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        min_gap: Duration,
    ) -> Result<bool> {
        let Some(contact) = self.get(id).await? else {
            return Err(Error::not_found("contact", id.to_string()));
        };

        if let Some(last) = contact.last_dispatched_at {
            if now - last < min_gap {
                return Ok(false);
            }
        }

        // Conditional update against the value we just read; a concurrent
        // claimer changes it first and our condition fails
        let query = format!(
            "UPDATE {}.contacts SET last_dispatched_at = ? WHERE id = ? IF last_dispatched_at = ?",
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(
                query,
                (millis(now), id, contact.last_dispatched_at.map(millis)),
            )
            .await
            .map_err(PersistenceError::from)?;

        Ok(lwt_applied(&result))
    }

    async fn clear_dispatch_claim(&self, id: Uuid) -> Result<()> {
        let query = format!(
            "UPDATE {}.contacts SET last_dispatched_at = null WHERE id = ?",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(query, (id,))
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }
}

/// Calls table
pub struct ScyllaCallStore {
    client: ScyllaClient,
}

type CallRow = (
    Uuid,
    Uuid,
    Option<Uuid>,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<i64>,
    i32,
    f64,
    f64,
    f64,
    f64,
    Option<String>,
    Option<String>,
    i64,
);

impl ScyllaCallStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    const COLUMNS: &'static str = "id, contact_id, campaign_id, direction, status, external_ref, \
                                   started_at, ended_at, duration_seconds, cost_telephony, \
                                   cost_tts, cost_asr, cost_llm, outcome, recording_url, \
                                   created_at";

    fn row_to_call(row: CallRow) -> Result<Call> {
        let (
            id,
            contact_id,
            campaign_id,
            direction,
            status,
            external_ref,
            started_at,
            ended_at,
            duration_seconds,
            cost_telephony,
            cost_tts,
            cost_asr,
            cost_llm,
            outcome,
            recording_url,
            created_at,
        ) = row;
        Ok(Call {
            id,
            contact_id,
            campaign_id,
            direction: parse_enum(&direction, CallDirection::parse, "call direction")?,
            status: parse_enum(&status, CallStatus::parse, "call status")?,
            external_ref,
            started_at: started_at.map(from_millis),
            ended_at: ended_at.map(from_millis),
            duration_seconds: duration_seconds.max(0) as u32,
            costs: CallCosts {
                telephony: cost_telephony,
                tts: cost_tts,
                asr: cost_asr,
                llm: cost_llm,
            },
            outcome,
            recording_url,
            created_at: from_millis(created_at),
        })
    }

    async fn select_calls(
        &self,
        query: String,
        values: impl scylla::serialize::row::SerializeRow,
    ) -> Result<Vec<Call>> {
        let result = self
            .client
            .session()
            .query_unpaged(query, values)
            .await
            .map_err(PersistenceError::from)?;

        let mut calls = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let typed: CallRow = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                calls.push(Self::row_to_call(typed)?);
            }
        }
        Ok(calls)
    }
}

#[async_trait]
impl CallStore for ScyllaCallStore {
    async fn get(&self, id: Uuid) -> Result<Option<Call>> {
        let query = format!(
            "SELECT {} FROM {}.calls WHERE id = ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        Ok(self.select_calls(query, (id,)).await?.into_iter().next())
    }

    async fn upsert(&self, call: &Call) -> Result<()> {
        let query = format!(
            "INSERT INTO {}.calls ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace(),
            Self::COLUMNS
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    call.id,
                    call.contact_id,
                    call.campaign_id,
                    call.direction.as_str(),
                    call.status.as_str(),
                    call.external_ref.as_deref(),
                    call.started_at.map(millis),
                    call.ended_at.map(millis),
                    call.duration_seconds as i32,
                    call.costs.telephony,
                    call.costs.tts,
                    call.costs.asr,
                    call.costs.llm,
                    call.outcome.as_deref(),
                    call.recording_url.as_deref(),
                    millis(call.created_at),
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn latest_since(
        &self,
        contact_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<Call>> {
        let query = format!(
            "SELECT {} FROM {}.calls WHERE contact_id = ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        let calls = self.select_calls(query, (contact_id,)).await?;
        Ok(calls
            .into_iter()
            .filter(|c| c.created_at >= since && c.status != CallStatus::Failed)
            .max_by_key(|c| c.created_at))
    }

    async fn list_active(&self) -> Result<Vec<Call>> {
        let mut active = Vec::new();
        for status in [
            CallStatus::Initiated,
            CallStatus::Queued,
            CallStatus::Ringing,
            CallStatus::InProgress,
        ] {
            let query = format!(
                "SELECT {} FROM {}.calls WHERE status = ?",
                Self::COLUMNS,
                self.client.keyspace()
            );
            active.extend(self.select_calls(query, (status.as_str(),)).await?);
        }
        Ok(active)
    }

    async fn list_by_campaign(&self, campaign_id: Uuid) -> Result<Vec<Call>> {
        let query = format!(
            "SELECT {} FROM {}.calls WHERE campaign_id = ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        self.select_calls(query, (campaign_id,)).await
    }
}

/// Turns table, clustered by turn number
pub struct ScyllaTurnStore {
    client: ScyllaClient,
}

type TurnRow = (Uuid, i32, String, String, String, f32, i64);

impl ScyllaTurnStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    const COLUMNS: &'static str =
        "call_id, turn_number, state, user_input, bot_response, confidence, created_at";

    fn row_to_turn(row: TurnRow) -> Result<Turn> {
        let (call_id, turn_number, state, user_input, bot_response, confidence, created_at) = row;
        Ok(Turn {
            call_id,
            turn_number: turn_number.max(0) as u32,
            state: parse_enum(&state, ConversationState::parse, "conversation state")?,
            user_input,
            bot_response,
            confidence,
            created_at: from_millis(created_at),
        })
    }
}

#[async_trait]
impl TurnStore for ScyllaTurnStore {
    async fn append(&self, turn: &Turn) -> Result<bool> {
        let query = format!(
            "INSERT INTO {}.turns ({}) VALUES (?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS",
            self.client.keyspace(),
            Self::COLUMNS
        );
        let result = self
            .client
            .session()
            .query_unpaged(
                query,
                (
                    turn.call_id,
                    turn.turn_number as i32,
                    turn.state.as_str(),
                    turn.user_input.as_str(),
                    turn.bot_response.as_str(),
                    turn.confidence,
                    millis(turn.created_at),
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(lwt_applied(&result))
    }

    async fn get(&self, call_id: Uuid, turn_number: u32) -> Result<Option<Turn>> {
        let query = format!(
            "SELECT {} FROM {}.turns WHERE call_id = ? AND turn_number = ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(query, (call_id, turn_number as i32))
            .await
            .map_err(PersistenceError::from)?;

        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => {
                let typed: TurnRow = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                Ok(Some(Self::row_to_turn(typed)?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, call_id: Uuid) -> Result<Vec<Turn>> {
        let query = format!(
            "SELECT {} FROM {}.turns WHERE call_id = ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(query, (call_id,))
            .await
            .map_err(PersistenceError::from)?;

        let mut turns = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let typed: TurnRow = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                turns.push(Self::row_to_turn(typed)?);
            }
        }
        Ok(turns)
    }

    async fn count(&self, call_id: Uuid) -> Result<u32> {
        let query = format!(
            "SELECT COUNT(*) FROM {}.turns WHERE call_id = ?",
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(query, (call_id,))
            .await
            .map_err(PersistenceError::from)?;

        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => {
                let (count,): (i64,) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                Ok(count.max(0) as u32)
            }
            None => Ok(0),
        }
    }
}

/// Qualification table, one row per contact
pub struct ScyllaQualificationStore {
    client: ScyllaClient,
}

type QualificationRow = (
    Uuid,
    i32,
    Option<String>,
    Option<String>,
    Option<i32>,
    bool,
    bool,
    bool,
    i64,
);

impl ScyllaQualificationStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    const COLUMNS: &'static str = "contact_id, score, timeline, budget_range, properties_count, \
                                   needs_video, needs_photos, decision_maker, updated_at";
}

#[async_trait]
impl QualificationStore for ScyllaQualificationStore {
    async fn get(&self, contact_id: Uuid) -> Result<Option<QualificationData>> {
        let query = format!(
            "SELECT {} FROM {}.qualification_data WHERE contact_id = ?",
            Self::COLUMNS,
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(query, (contact_id,))
            .await
            .map_err(PersistenceError::from)?;

        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => {
                let (
                    contact_id,
                    score,
                    timeline,
                    budget_range,
                    properties_count,
                    needs_video,
                    needs_photos,
                    decision_maker,
                    updated_at,
                ): QualificationRow = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                Ok(Some(QualificationData {
                    contact_id,
                    score: score.max(0) as u32,
                    timeline: timeline.as_deref().and_then(Timeline::parse),
                    budget_range: budget_range.as_deref().and_then(BudgetRange::parse),
                    properties_count: properties_count.map(|c| c.max(0) as u32),
                    needs_video,
                    needs_photos,
                    decision_maker,
                    updated_at: from_millis(updated_at),
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, data: &QualificationData) -> Result<()> {
        let query = format!(
            "INSERT INTO {}.qualification_data ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace(),
            Self::COLUMNS
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    data.contact_id,
                    data.score as i32,
                    data.timeline.map(|t| t.as_str()),
                    data.budget_range.map(|b| b.as_str()),
                    data.properties_count.map(|c| c as i32),
                    data.needs_video,
                    data.needs_photos,
                    data.decision_maker,
                    millis(data.updated_at),
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }
}

/// DNC ledger table
pub struct ScyllaDncStore {
    client: ScyllaClient,
}

impl ScyllaDncStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DncStore for ScyllaDncStore {
    async fn contains(&self, phone: &str) -> Result<bool> {
        let query = format!(
            "SELECT phone FROM {}.dnc_entries WHERE phone = ?",
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(query, (phone,))
            .await
            .map_err(PersistenceError::from)?;
        Ok(result.rows.map(|r| !r.is_empty()).unwrap_or(false))
    }

    async fn add(&self, entry: &DncEntry) -> Result<()> {
        // IF NOT EXISTS keeps the first recorded reason; the ledger is
        // append-only
        let query = format!(
            "INSERT INTO {}.dnc_entries (phone, reason, source, created_at) \
             VALUES (?, ?, ?, ?) IF NOT EXISTS",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    entry.phone.as_str(),
                    entry.reason.as_str(),
                    entry.source.as_str(),
                    millis(entry.created_at),
                ),
            )
            .await
            .map_err(PersistenceError::from)?;
        Ok(())
    }
}
