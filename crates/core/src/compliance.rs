//! Eligibility decision types for the compliance gate

use serde::{Deserialize, Serialize};

use crate::model::Contact;

/// Reason a contact may not be dialed right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    /// Contact record does not exist
    NotFound,
    /// Contact carries the dnc flag
    DncFlag,
    /// Contact's phone appears in the DNC ledger
    DncList,
    /// Current time is outside the calling window; transient
    OutsideHours,
    /// A call to this contact exists within the lookback window
    RecentCall,
}

impl EligibilityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::DncFlag => "dnc_flag",
            Self::DncList => "dnc_list",
            Self::OutsideHours => "outside_hours",
            Self::RecentCall => "recent_call",
        }
    }

    /// Transient reasons should be rescheduled instead of skipped
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OutsideHours)
    }
}

impl std::fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a compliance check
#[derive(Debug, Clone)]
pub enum Eligibility {
    /// Contact may be dialed; carries the loaded record so callers avoid a
    /// second fetch
    Eligible(Box<Contact>),
    Ineligible(EligibilityReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible(_))
    }

    pub fn reason(&self) -> Option<EligibilityReason> {
        match self {
            Self::Eligible(_) => None,
            Self::Ineligible(reason) => Some(*reason),
        }
    }
}
