//! Compliance gate
//!
//! Stateless predicate over a contact's eligibility to be dialed right now.
//! Checks run in a fixed order and the first failure wins. The only side
//! effect is the DNC repair: a contact whose phone is found in the ledger
//! gets its `dnc` flag set so the two stay convergent.

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use uuid::Uuid;

use dialwave_core::{Clock, DncEntry, Eligibility, EligibilityReason, Result};
use dialwave_persistence::{CallStore, ContactStore, DncStore};

/// Daily calling window in whole hours
#[derive(Debug, Clone, Copy)]
pub struct CallingWindow {
    /// First callable hour (inclusive)
    pub start_hour: u8,
    /// End of the window (exclusive)
    pub end_hour: u8,
}

impl CallingWindow {
    pub fn new(start_hour: u8, end_hour: u8) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Whether `at` falls inside the window.
    ///
    /// With an explicit UTC offset (per-campaign override) the hour is
    /// shifted by that offset; otherwise the server-local clock decides.
    pub fn contains(&self, at: DateTime<Utc>, utc_offset_hours: Option<i8>) -> bool {
        let hour = match utc_offset_hours {
            Some(offset) => (at + Duration::hours(offset as i64)).hour(),
            None => at.with_timezone(&chrono::Local).hour(),
        };
        hour >= self.start_hour as u32 && hour < self.end_hour as u32
    }
}

impl Default for CallingWindow {
    fn default() -> Self {
        Self::new(9, 17)
    }
}

/// Eligibility predicate over contacts
pub struct ComplianceGate {
    contacts: Arc<dyn ContactStore>,
    dnc: Arc<dyn DncStore>,
    calls: Arc<dyn CallStore>,
    clock: Arc<dyn Clock>,
    window: CallingWindow,
    lookback: Duration,
}

impl ComplianceGate {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        dnc: Arc<dyn DncStore>,
        calls: Arc<dyn CallStore>,
        clock: Arc<dyn Clock>,
        window: CallingWindow,
        lookback_hours: u32,
    ) -> Self {
        Self {
            contacts,
            dnc,
            calls,
            clock,
            window,
            lookback: Duration::hours(lookback_hours as i64),
        }
    }

    pub fn lookback(&self) -> Duration {
        self.lookback
    }

    /// Check whether a contact may be dialed now.
    ///
    /// Checks in order, first failure wins: contact exists, dnc flag, DNC
    /// ledger (with flag repair), calling window, recent-call lookback.
    pub async fn check_eligible(
        &self,
        contact_id: Uuid,
        utc_offset_hours: Option<i8>,
    ) -> Result<Eligibility> {
        let Some(contact) = self.contacts.get(contact_id).await? else {
            return Ok(Eligibility::Ineligible(EligibilityReason::NotFound));
        };

        if contact.dnc {
            return Ok(Eligibility::Ineligible(EligibilityReason::DncFlag));
        }

        if self.dnc.contains(&contact.phone).await? {
            // Repair the flag so flag and ledger stay convergent
            self.contacts.set_dnc(contact.id, true).await?;
            tracing::info!(
                contact_id = %contact.id,
                phone = %contact.phone,
                "contact found in DNC ledger, flag repaired"
            );
            return Ok(Eligibility::Ineligible(EligibilityReason::DncList));
        }

        let now = self.clock.now();
        if !self.window.contains(now, utc_offset_hours) {
            return Ok(Eligibility::Ineligible(EligibilityReason::OutsideHours));
        }

        if self
            .calls
            .latest_since(contact.id, now - self.lookback)
            .await?
            .is_some()
        {
            return Ok(Eligibility::Ineligible(EligibilityReason::RecentCall));
        }

        Ok(Eligibility::Eligible(Box::new(contact)))
    }

    /// Record an opt-out: flag the contact and append to the ledger
    pub async fn record_opt_out(
        &self,
        contact_id: Uuid,
        phone: &str,
        reason: &str,
        source: &str,
    ) -> Result<()> {
        self.contacts.set_dnc(contact_id, true).await?;
        self.dnc
            .add(&DncEntry {
                phone: phone.to_string(),
                reason: reason.to_string(),
                source: source.to_string(),
                created_at: self.clock.now(),
            })
            .await?;
        tracing::info!(contact_id = %contact_id, phone = %phone, source = %source, "opt-out recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_with_explicit_offset() {
        let window = CallingWindow::new(9, 17);
        let morning = Utc.with_ymd_and_hms(2025, 6, 2, 10, 30, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2025, 6, 2, 19, 0, 0).unwrap();

        assert!(window.contains(morning, Some(0)));
        assert!(!window.contains(evening, Some(0)));
        // Shifting the same instant into an earlier timezone re-opens it
        assert!(window.contains(evening, Some(-5)));
    }

    #[test]
    fn window_boundaries() {
        let window = CallingWindow::new(9, 17);
        let at = |h| Utc.with_ymd_and_hms(2025, 6, 2, h, 0, 0).unwrap();
        assert!(!window.contains(at(8), Some(0)));
        assert!(window.contains(at(9), Some(0)));
        assert!(window.contains(at(16), Some(0)));
        assert!(!window.contains(at(17), Some(0)));
    }
}
