//! Deterministic qualification extraction
//!
//! Rule-based rather than model-based so the inputs to scoring are
//! reproducible and auditable. Only runs when the conversation is in the
//! qualify state.

use once_cell::sync::Lazy;
use regex::Regex;

use dialwave_core::{BudgetRange, QualificationUpdate, Timeline};

static PROPERTIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:properties|property|buildings?|listings?)").expect("valid regex")
});

static DOLLAR_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$\s*([\d,]+)|([\d,]+)\s*dollars?").expect("valid regex")
});

static URGENT_TIMELINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)next\s+(?:week|month)|asap|immediately|urgent").expect("valid regex")
});

static DAY_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:within|in)\s+(\d+)\s*days").expect("valid regex"));

static QUARTER_TIMELINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)quarter|3\s*months?").expect("valid regex"));

static VIDEO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)video|footage|aerial").expect("valid regex"));

static PHOTOS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)photo|picture|image").expect("valid regex"));

static DECISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)decision|authorize|approve|budget").expect("valid regex"));

/// Extract qualification signals from one utterance
pub fn extract_qualification(utterance: &str) -> QualificationUpdate {
    let mut update = QualificationUpdate::default();

    if let Some(caps) = PROPERTIES.captures(utterance) {
        if let Some(count) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
            update.properties_count = Some(count);
        }
    }

    if let Some(caps) = DOLLAR_AMOUNT.captures(utterance) {
        let raw = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().replace(',', ""));
        if let Some(amount) = raw.and_then(|r| r.parse::<u64>().ok()) {
            update.budget_range = Some(BudgetRange::from_amount(amount));
        }
    }

    if URGENT_TIMELINE.is_match(utterance) {
        update.timeline = Some(Timeline::Within30Days);
    } else if let Some(days) = DAY_COUNT
        .captures(utterance)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        update.timeline = Some(if days <= 30 {
            Timeline::Within30Days
        } else {
            Timeline::Within90Days
        });
    } else if QUARTER_TIMELINE.is_match(utterance) {
        update.timeline = Some(Timeline::Within90Days);
    }

    if VIDEO.is_match(utterance) {
        update.needs_video = Some(true);
    }
    if PHOTOS.is_match(utterance) {
        update.needs_photos = Some(true);
    }
    if DECISION.is_match(utterance) {
        update.decision_maker = Some(true);
    }

    update
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_property_count() {
        let update = extract_qualification("we manage 12 listings downtown");
        assert_eq!(update.properties_count, Some(12));

        let update = extract_qualification("just one building");
        assert_eq!(update.properties_count, None);
    }

    #[test]
    fn bands_dollar_amounts() {
        assert_eq!(
            extract_qualification("around $1,500 a month").budget_range,
            Some(BudgetRange::Under2k)
        );
        assert_eq!(
            extract_qualification("budget around $3000").budget_range,
            Some(BudgetRange::TwoToFive)
        );
        assert_eq!(
            extract_qualification("we spend 8,000 dollars").budget_range,
            Some(BudgetRange::FivePlus)
        );
    }

    #[test]
    fn amount_is_taken_from_the_dollar_figure_not_other_numbers() {
        // The 6 must not be mistaken for the budget
        let update =
            extract_qualification("We have 6 properties and a budget around $3000");
        assert_eq!(update.properties_count, Some(6));
        assert_eq!(update.budget_range, Some(BudgetRange::TwoToFive));
    }

    #[test]
    fn urgency_beats_quarter() {
        assert_eq!(
            extract_qualification("asap, ideally next week").timeline,
            Some(Timeline::Within30Days)
        );
        assert_eq!(
            extract_qualification("sometime this quarter").timeline,
            Some(Timeline::Within90Days)
        );
    }

    #[test]
    fn day_counts_are_banded() {
        assert_eq!(
            extract_qualification("need it within 30 days").timeline,
            Some(Timeline::Within30Days)
        );
        assert_eq!(
            extract_qualification("in 60 days maybe").timeline,
            Some(Timeline::Within90Days)
        );
    }

    #[test]
    fn keyword_flags() {
        let update = extract_qualification(
            "we want aerial footage and some pictures, I can approve the spend",
        );
        assert_eq!(update.needs_video, Some(true));
        assert_eq!(update.needs_photos, Some(true));
        assert_eq!(update.decision_maker, Some(true));
    }

    #[test]
    fn scenario_a_utterance() {
        let update = extract_qualification(
            "We have 6 properties and need something within 30 days, budget around $3000",
        );
        assert_eq!(update.properties_count, Some(6));
        assert_eq!(update.timeline, Some(Timeline::Within30Days));
        assert_eq!(update.budget_range, Some(BudgetRange::TwoToFive));
        // "budget" keyword marks decision authority
        assert_eq!(update.decision_maker, Some(true));
    }

    #[test]
    fn empty_utterance_yields_empty_update() {
        assert!(extract_qualification("").is_empty());
        assert!(extract_qualification("hello there").is_empty());
    }
}
