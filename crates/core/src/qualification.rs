//! Typed qualification schema
//!
//! Signals extracted from a qualify-state utterance. Fields are typed enums
//! rather than free-form strings so scoring and the qualification decision
//! stay auditable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Buying timeline bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeline {
    #[serde(rename = "0-30 days")]
    Within30Days,
    #[serde(rename = "30-90 days")]
    Within90Days,
    #[serde(rename = "over_6_months")]
    OverSixMonths,
}

impl Timeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Within30Days => "0-30 days",
            Self::Within90Days => "30-90 days",
            Self::OverSixMonths => "over_6_months",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "0-30 days" => Some(Self::Within30Days),
            "30-90 days" => Some(Self::Within90Days),
            "over_6_months" => Some(Self::OverSixMonths),
            _ => None,
        }
    }
}

/// Monthly marketing budget bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetRange {
    #[serde(rename = "$500-$2,000")]
    Under2k,
    #[serde(rename = "$2,000-$5,000")]
    TwoToFive,
    #[serde(rename = "$5,000+")]
    FivePlus,
}

impl BudgetRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Under2k => "$500-$2,000",
            Self::TwoToFive => "$2,000-$5,000",
            Self::FivePlus => "$5,000+",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "$500-$2,000" => Some(Self::Under2k),
            "$2,000-$5,000" => Some(Self::TwoToFive),
            "$5,000+" => Some(Self::FivePlus),
            _ => None,
        }
    }

    /// Band a raw dollar amount
    pub fn from_amount(amount: u64) -> Self {
        if amount < 2_000 {
            Self::Under2k
        } else if amount < 5_000 {
            Self::TwoToFive
        } else {
            Self::FivePlus
        }
    }

    /// Midpoint used when estimating deal value for the CRM
    pub fn midpoint_value(&self) -> f64 {
        match self {
            Self::Under2k => 1_250.0,
            Self::TwoToFive => 3_500.0,
            Self::FivePlus => 7_500.0,
        }
    }
}

/// Partial signals extracted from a single utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualificationUpdate {
    pub properties_count: Option<u32>,
    pub budget_range: Option<BudgetRange>,
    pub timeline: Option<Timeline>,
    pub needs_video: Option<bool>,
    pub needs_photos: Option<bool>,
    pub decision_maker: Option<bool>,
}

impl QualificationUpdate {
    pub fn is_empty(&self) -> bool {
        self.properties_count.is_none()
            && self.budget_range.is_none()
            && self.timeline.is_none()
            && self.needs_video.is_none()
            && self.needs_photos.is_none()
            && self.decision_maker.is_none()
    }
}

/// Cumulative qualification record, one per contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationData {
    pub contact_id: Uuid,
    pub score: u32,
    pub timeline: Option<Timeline>,
    pub budget_range: Option<BudgetRange>,
    pub properties_count: Option<u32>,
    pub needs_video: bool,
    pub needs_photos: bool,
    pub decision_maker: bool,
    pub updated_at: DateTime<Utc>,
}

impl QualificationData {
    pub fn new(contact_id: Uuid) -> Self {
        Self {
            contact_id,
            score: 0,
            timeline: None,
            budget_range: None,
            properties_count: None,
            needs_video: false,
            needs_photos: false,
            decision_maker: false,
            updated_at: Utc::now(),
        }
    }

    /// Merge a per-turn update into the cumulative record. Newly observed
    /// signals overwrite; absent fields leave prior values in place.
    pub fn apply(&mut self, update: &QualificationUpdate) {
        if let Some(count) = update.properties_count {
            self.properties_count = Some(count);
        }
        if let Some(range) = update.budget_range {
            self.budget_range = Some(range);
        }
        if let Some(timeline) = update.timeline {
            self.timeline = Some(timeline);
        }
        if let Some(v) = update.needs_video {
            self.needs_video = v;
        }
        if let Some(p) = update.needs_photos {
            self.needs_photos = p;
        }
        if let Some(d) = update.decision_maker {
            self.decision_maker = d;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_banding() {
        assert_eq!(BudgetRange::from_amount(500), BudgetRange::Under2k);
        assert_eq!(BudgetRange::from_amount(1_999), BudgetRange::Under2k);
        assert_eq!(BudgetRange::from_amount(2_000), BudgetRange::TwoToFive);
        assert_eq!(BudgetRange::from_amount(4_999), BudgetRange::TwoToFive);
        assert_eq!(BudgetRange::from_amount(5_000), BudgetRange::FivePlus);
        assert_eq!(BudgetRange::from_amount(25_000), BudgetRange::FivePlus);
    }

    #[test]
    fn apply_merges_without_clearing() {
        let mut data = QualificationData::new(Uuid::new_v4());
        data.apply(&QualificationUpdate {
            properties_count: Some(6),
            timeline: Some(Timeline::Within30Days),
            ..Default::default()
        });
        // Empty update leaves everything in place
        data.apply(&QualificationUpdate::default());
        assert_eq!(data.properties_count, Some(6));
        assert_eq!(data.timeline, Some(Timeline::Within30Days));

        // New signal overwrites
        data.apply(&QualificationUpdate {
            timeline: Some(Timeline::Within90Days),
            ..Default::default()
        });
        assert_eq!(data.timeline, Some(Timeline::Within90Days));
    }

    #[test]
    fn serde_uses_wire_labels() {
        let json = serde_json::to_string(&Timeline::Within30Days).unwrap();
        assert_eq!(json, "\"0-30 days\"");
        let json = serde_json::to_string(&BudgetRange::TwoToFive).unwrap();
        assert_eq!(json, "\"$2,000-$5,000\"");
    }
}
