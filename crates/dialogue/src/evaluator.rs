//! Lead qualification evaluator
//!
//! Merges per-turn extraction into the cumulative qualification record,
//! recomputes the score, decides the outcome, and updates the contact's
//! pipeline status. CRM and SMS follow-ups are best-effort: their failure
//! is logged and never changes the persisted result. Calling twice with the
//! same cumulative input leaves status and score unchanged.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use dialwave_config::{SalesScript, ScriptLibrary};
use dialwave_core::{
    Clock, Contact, ContactStatus, Error, QualificationData, QualificationUpdate, Result,
    Telephony, Timeline,
};
use dialwave_integrations::{CrmConnector, CrmContact, CrmDeal};
use dialwave_persistence::{ContactStore, QualificationStore};

use crate::scoring::calculate_lead_score;

const QUALIFY_MIN_SCORE: u32 = 15;
const NURTURE_MIN_SCORE: u32 = 8;
const CALLBACK_MIN_SCORE: u32 = 12;
const DEAL_PIPELINE: &str = "default";
const DEAL_STAGE: &str = "appointmentscheduled";

/// Recommended follow-up after evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    BookMeeting,
    ScheduleCallback,
    EmailNurture,
    Archive,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookMeeting => "book_meeting",
            Self::ScheduleCallback => "schedule_callback",
            Self::EmailNurture => "email_nurture",
            Self::Archive => "archive",
        }
    }
}

/// Evaluation result
#[derive(Debug, Clone, Serialize)]
pub struct QualificationOutcome {
    pub qualified: bool,
    pub score: u32,
    pub status: ContactStatus,
    pub next_action: NextAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Merges, scores, and decides lead qualification
pub struct LeadQualificationEvaluator {
    contacts: Arc<dyn ContactStore>,
    qualifications: Arc<dyn QualificationStore>,
    crm: Arc<dyn CrmConnector>,
    telephony: Arc<dyn Telephony>,
    scripts: Arc<ScriptLibrary>,
    nurture_sequence_id: String,
    clock: Arc<dyn Clock>,
}

impl LeadQualificationEvaluator {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        qualifications: Arc<dyn QualificationStore>,
        crm: Arc<dyn CrmConnector>,
        telephony: Arc<dyn Telephony>,
        scripts: Arc<ScriptLibrary>,
        nurture_sequence_id: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            contacts,
            qualifications,
            crm,
            telephony,
            scripts,
            nurture_sequence_id: nurture_sequence_id.into(),
            clock,
        }
    }

    /// Merge an update, rescore, and decide the outcome for a contact
    pub async fn qualify_lead(
        &self,
        contact_id: Uuid,
        update: &QualificationUpdate,
    ) -> Result<QualificationOutcome> {
        let contact = self
            .contacts
            .get(contact_id)
            .await?
            .ok_or_else(|| Error::not_found("contact", contact_id.to_string()))?;

        let mut data = self
            .qualifications
            .get(contact_id)
            .await?
            .unwrap_or_else(|| QualificationData::new(contact_id));
        data.apply(update);
        data.score = calculate_lead_score(&data);
        data.updated_at = self.clock.now();
        self.qualifications.upsert(&data).await?;

        let qualified = Self::evaluate(&data);
        let status = if qualified {
            ContactStatus::Qualified
        } else if data.score > NURTURE_MIN_SCORE {
            ContactStatus::Nurture
        } else {
            ContactStatus::Disqualified
        };

        // Status change drives the downstream effects exactly once; a
        // repeat call with the same cumulative data is a no-op here
        if contact.status != status {
            self.contacts.set_status(contact_id, status).await?;
            match status {
                ContactStatus::Qualified => {
                    metrics::counter!("dialwave_leads_qualified_total").increment(1);
                    self.on_qualified(&contact, &data).await;
                }
                ContactStatus::Nurture => self.on_nurture(&contact).await,
                _ => {}
            }
        }

        let next_action = if qualified {
            NextAction::BookMeeting
        } else if data.score >= CALLBACK_MIN_SCORE {
            NextAction::ScheduleCallback
        } else if data.score >= NURTURE_MIN_SCORE {
            NextAction::EmailNurture
        } else {
            NextAction::Archive
        };

        tracing::info!(
            contact_id = %contact_id,
            score = data.score,
            qualified,
            status = %status.as_str(),
            next_action = %next_action.as_str(),
            "lead evaluated"
        );

        Ok(QualificationOutcome {
            qualified,
            score: data.score,
            status,
            next_action,
            reason: (!qualified).then(|| Self::disqualification_reason(&data)),
        })
    }

    fn evaluate(data: &QualificationData) -> bool {
        data.score >= QUALIFY_MIN_SCORE
            && data.timeline.is_some()
            && data.budget_range.is_some()
            && data.timeline != Some(Timeline::OverSixMonths)
    }

    fn disqualification_reason(data: &QualificationData) -> String {
        if data.timeline.is_none() || data.timeline == Some(Timeline::OverSixMonths) {
            "Timeline too far out".to_string()
        } else if data.budget_range.is_none() {
            "Budget not aligned".to_string()
        } else if !data.decision_maker {
            "Not decision maker".to_string()
        } else if data.score < NURTURE_MIN_SCORE {
            "Low engagement score".to_string()
        } else {
            "Does not meet qualification criteria".to_string()
        }
    }

    /// Deal value estimate: budget band midpoint scaled by property count
    fn estimate_deal_value(data: &QualificationData) -> f64 {
        let base = data
            .budget_range
            .map(|b| b.midpoint_value())
            .unwrap_or(1_000.0);
        let multiplier = data.properties_count.unwrap_or(1).clamp(1, 5);
        base * multiplier as f64
    }

    /// Best-effort CRM sync and booking-link SMS for a qualified lead
    async fn on_qualified(&self, contact: &Contact, data: &QualificationData) {
        let script = self.script_for(contact);
        let (first_name, last_name) = CrmContact::split_name(&contact.full_name);
        let email = CrmContact::placeholder_email(&contact.phone);

        let crm_contact = CrmContact {
            email: email.clone(),
            first_name,
            last_name,
            phone: contact.phone.clone(),
            company: contact.company.clone(),
            properties: json!({
                "lead_score": data.score,
                "timeline": data.timeline.map(|t| t.as_str()),
                "budget_range": data.budget_range.map(|b| b.as_str()),
                "needs_video": data.needs_video,
                "needs_photos": data.needs_photos,
                "properties_count": data.properties_count,
                "lead_source": "ai_outbound_call",
            }),
        };
        if let Err(e) = self.crm.upsert_contact(&crm_contact).await {
            tracing::warn!(error = %e, contact_id = %contact.id, "CRM contact upsert failed");
        }

        let deal = CrmDeal {
            name: format!("{} - Drone Media Services", contact.company),
            pipeline: DEAL_PIPELINE.to_string(),
            stage: DEAL_STAGE.to_string(),
            amount: Self::estimate_deal_value(data),
            contact_email: email,
        };
        if let Err(e) = self.crm.create_deal(&deal).await {
            tracing::warn!(error = %e, contact_id = %contact.id, "CRM deal creation failed");
        }

        let sms = SalesScript::render_sms(&script.booking_sms, &contact.full_name, &contact.company);
        if let Err(e) = self.telephony.send_message(&contact.phone, &sms).await {
            tracing::warn!(error = %e, contact_id = %contact.id, "booking SMS failed");
        }
    }

    /// Best-effort nurture enrollment and portfolio SMS
    async fn on_nurture(&self, contact: &Contact) {
        let script = self.script_for(contact);
        let email = CrmContact::placeholder_email(&contact.phone);

        if let Err(e) = self
            .crm
            .enroll_in_sequence(&email, &self.nurture_sequence_id)
            .await
        {
            tracing::warn!(error = %e, contact_id = %contact.id, "nurture enrollment failed");
        }

        let sms = SalesScript::render_sms(&script.nurture_sms, &contact.full_name, &contact.company);
        if let Err(e) = self.telephony.send_message(&contact.phone, &sms).await {
            tracing::warn!(error = %e, contact_id = %contact.id, "nurture SMS failed");
        }
    }

    fn script_for(&self, _contact: &Contact) -> &SalesScript {
        // Follow-ups use the default script's templates; per-campaign
        // overrides would need the campaign loaded here
        self.scripts.default_script()
    }
}
