//! Call job worker
//!
//! The body every queued job runs: confirm the campaign is still active,
//! re-check compliance, claim the contact against concurrent dispatchers,
//! then hand the call to the telephony provider. Only the provider call
//! consumes retry attempts; everything else is a structured skip or a
//! reschedule.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use dialwave_core::{
    Call, CallStatus, CampaignStatus, Clock, Contact, Eligibility, Result, Telephony,
};
use dialwave_persistence::{CallStore, CampaignStore, ContactStore};

use crate::compliance::ComplianceGate;
use crate::queue::{JobError, JobHandler, JobOutcome, JobPayload};

/// Skip reason when a dispatch claim loses to a concurrent worker
const SKIP_CONCURRENT: &str = "concurrent_dispatch";
/// Skip reason when the owning campaign is not active
const SKIP_CAMPAIGN_INACTIVE: &str = "campaign_inactive";

/// Executes one dial attempt per job
pub struct CallJobHandler {
    campaigns: Arc<dyn CampaignStore>,
    contacts: Arc<dyn ContactStore>,
    calls: Arc<dyn CallStore>,
    gate: Arc<ComplianceGate>,
    telephony: Arc<dyn Telephony>,
    clock: Arc<dyn Clock>,
    /// Delay applied when the calling window is closed
    reschedule_delay: Duration,
}

impl CallJobHandler {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        contacts: Arc<dyn ContactStore>,
        calls: Arc<dyn CallStore>,
        gate: Arc<ComplianceGate>,
        telephony: Arc<dyn Telephony>,
        clock: Arc<dyn Clock>,
        reschedule_delay: Duration,
    ) -> Self {
        Self {
            campaigns,
            contacts,
            calls,
            gate,
            telephony,
            clock,
            reschedule_delay,
        }
    }

    async fn dial(&self, contact: &Contact, campaign_id: Uuid) -> Result<Call> {
        let mut call = Call::outbound(contact.id, Some(campaign_id));
        self.calls.upsert(&call).await?;

        match self.telephony.initiate_call(contact, call.id).await {
            Ok(external_ref) => {
                call.external_ref = Some(external_ref);
                call.status = CallStatus::Queued;
                self.calls.upsert(&call).await?;
                metrics::counter!("dialwave_calls_initiated_total").increment(1);
                Ok(call)
            }
            Err(error) => {
                call.status = CallStatus::Failed;
                call.outcome = Some("initiate_failed".to_string());
                call.ended_at = Some(self.clock.now());
                if let Err(persist_error) = self.calls.upsert(&call).await {
                    tracing::error!(
                        call_id = %call.id,
                        error = %persist_error,
                        "failed to record failed call"
                    );
                }
                // Release the claim so the retry can re-claim the contact
                if let Err(claim_error) = self.contacts.clear_dispatch_claim(contact.id).await {
                    tracing::error!(
                        contact_id = %contact.id,
                        error = %claim_error,
                        "failed to release dispatch claim"
                    );
                }
                Err(error)
            }
        }
    }
}

#[async_trait]
impl JobHandler for CallJobHandler {
    async fn handle(
        &self,
        payload: &JobPayload,
        attempt: u32,
    ) -> std::result::Result<JobOutcome, JobError> {
        let campaign = self.campaigns.get(payload.campaign_id).await?;
        let Some(campaign) = campaign.filter(|c| c.status == CampaignStatus::Active) else {
            return Ok(JobOutcome::Skipped {
                reason: SKIP_CAMPAIGN_INACTIVE.to_string(),
            });
        };

        match self
            .gate
            .check_eligible(payload.contact_id, campaign.utc_offset_hours)
            .await?
        {
            Eligibility::Ineligible(reason) if reason.is_transient() => {
                Err(JobError::Reschedule {
                    delay: self.reschedule_delay,
                })
            }
            Eligibility::Ineligible(reason) => {
                metrics::counter!("dialwave_jobs_skipped_total", "reason" => reason.as_str())
                    .increment(1);
                Ok(JobOutcome::Skipped {
                    reason: reason.as_str().to_string(),
                })
            }
            Eligibility::Eligible(contact) => {
                // Optimistic claim closes the gate-to-call window against a
                // concurrent dispatch pass for the same contact
                let claimed = self
                    .contacts
                    .try_mark_dispatched(contact.id, self.clock.now(), self.gate.lookback())
                    .await?;
                if !claimed {
                    metrics::counter!("dialwave_jobs_skipped_total", "reason" => SKIP_CONCURRENT)
                        .increment(1);
                    return Ok(JobOutcome::Skipped {
                        reason: SKIP_CONCURRENT.to_string(),
                    });
                }

                tracing::info!(
                    contact_id = %contact.id,
                    campaign_id = %payload.campaign_id,
                    attempt,
                    "dialing contact"
                );
                let call = self.dial(&contact, payload.campaign_id).await?;
                Ok(JobOutcome::Dispatched { call_id: call.id })
            }
        }
    }
}
