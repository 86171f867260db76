//! Campaign dispatcher
//!
//! Resolves a contact selection and enqueues one job per contact with
//! client-side delay pacing. Exact rate smoothing is not attempted: the
//! telephony provider's concurrency ceiling bounds throughput anyway.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use dialwave_core::{CampaignStatus, ContactStatus, Error, Result};
use dialwave_persistence::{CampaignStore, ContactStore};

use crate::queue::{JobPayload, JobQueue};

/// Result of starting a campaign
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StartSummary {
    pub queued: usize,
    pub estimated_duration_ms: u64,
}

/// Inter-call delays for a paced batch: `index * (60000 / calls_per_minute)`
pub fn pacing_delays(count: usize, calls_per_minute: u32) -> Vec<Duration> {
    let interval = Duration::from_millis(60_000 / calls_per_minute.max(1) as u64);
    (0..count).map(|i| interval * i as u32).collect()
}

/// Starts and stops campaigns against the job queue
pub struct CampaignDispatcher {
    campaigns: Arc<dyn CampaignStore>,
    contacts: Arc<dyn ContactStore>,
    queue: JobQueue,
    batch_cap: usize,
    default_calls_per_minute: u32,
}

impl CampaignDispatcher {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        contacts: Arc<dyn ContactStore>,
        queue: JobQueue,
        batch_cap: usize,
        default_calls_per_minute: u32,
    ) -> Self {
        Self {
            campaigns,
            contacts,
            queue,
            batch_cap,
            default_calls_per_minute,
        }
    }

    /// Resolve the contact set and enqueue one paced job per contact.
    ///
    /// An explicit id list is filtered down to callable contacts; without
    /// one, the default selection is new, non-DNC contacts capped at the
    /// batch size. The campaign's daily call cap further bounds the batch.
    pub async fn start_campaign(
        &self,
        campaign_id: Uuid,
        contact_ids: Option<Vec<Uuid>>,
        calls_per_minute: Option<u32>,
    ) -> Result<StartSummary> {
        let campaign = self
            .campaigns
            .get(campaign_id)
            .await?
            .ok_or_else(|| Error::not_found("campaign", campaign_id.to_string()))?;

        let mut contacts = match contact_ids {
            Some(ids) => self
                .contacts
                .fetch_many(&ids)
                .await?
                .into_iter()
                .filter(|c| !c.dnc && c.status != ContactStatus::Qualified)
                .collect(),
            None => {
                let mut new_contacts = self
                    .contacts
                    .list_by_status(ContactStatus::New, self.batch_cap)
                    .await?;
                new_contacts.retain(|c| !c.dnc);
                new_contacts
            }
        };

        let mut cap = self.batch_cap;
        if campaign.daily_call_cap > 0 {
            cap = cap.min(campaign.daily_call_cap as usize);
        }
        contacts.truncate(cap);

        self.campaigns
            .set_status(campaign_id, CampaignStatus::Active)
            .await?;

        let cpm = calls_per_minute.unwrap_or(self.default_calls_per_minute);
        let delays = pacing_delays(contacts.len(), cpm);
        for (contact, delay) in contacts.iter().zip(&delays) {
            self.queue.enqueue(
                JobPayload {
                    contact_id: contact.id,
                    campaign_id,
                },
                *delay,
                campaign.retry_policy,
            );
        }

        let interval_ms = 60_000 / cpm.max(1) as u64;
        let estimated_duration_ms = interval_ms * contacts.len() as u64;

        tracing::info!(
            campaign_id = %campaign_id,
            queued = contacts.len(),
            calls_per_minute = cpm,
            estimated_duration_ms,
            "campaign started"
        );

        Ok(StartSummary {
            queued: contacts.len(),
            estimated_duration_ms,
        })
    }

    /// Pause the campaign and cancel its not-yet-started jobs.
    ///
    /// Best-effort: a job already executing finishes its call.
    pub async fn stop_campaign(&self, campaign_id: Uuid) -> Result<usize> {
        let campaign = self.campaigns.get(campaign_id).await?;
        if campaign.is_none() {
            return Err(Error::not_found("campaign", campaign_id.to_string()));
        }

        self.campaigns
            .set_status(campaign_id, CampaignStatus::Paused)
            .await?;
        let cancelled = self.queue.cancel_for_campaign(campaign_id);

        tracing::info!(campaign_id = %campaign_id, cancelled, "campaign stopped");
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_matches_calls_per_minute() {
        // 3 contacts at 2 calls/minute: 0ms, 30000ms, 60000ms
        let delays = pacing_delays(3, 2);
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(0),
                Duration::from_millis(30_000),
                Duration::from_millis(60_000),
            ]
        );
    }

    #[test]
    fn pacing_handles_faster_rates() {
        let delays = pacing_delays(4, 6);
        assert_eq!(delays[1], Duration::from_millis(10_000));
        assert_eq!(delays[3], Duration::from_millis(30_000));
    }

    #[test]
    fn zero_rate_is_clamped() {
        let delays = pacing_delays(2, 0);
        assert_eq!(delays[1], Duration::from_millis(60_000));
    }
}
