//! Lead scoring
//!
//! Pure function over the cumulative qualification record; identical input
//! always yields the identical score.

use dialwave_core::{BudgetRange, QualificationData, Timeline};

/// Compute the lead score from qualification signals
pub fn calculate_lead_score(data: &QualificationData) -> u32 {
    let mut score = 0;

    match data.timeline {
        Some(Timeline::Within30Days) => score += 10,
        Some(Timeline::Within90Days) => score += 5,
        Some(Timeline::OverSixMonths) | None => {}
    }

    if let Some(count) = data.properties_count {
        if count >= 5 {
            score += 8;
        } else if count >= 2 {
            score += 5;
        }
    }

    if data.needs_video {
        score += 5;
    }
    if data.needs_photos {
        score += 3;
    }

    match data.budget_range {
        Some(BudgetRange::FivePlus) => score += 10,
        Some(BudgetRange::TwoToFive) => score += 7,
        Some(BudgetRange::Under2k) => score += 3,
        None => {}
    }

    if data.decision_maker {
        score += 5;
    }

    score
}
