//! Conversation state machine data
//!
//! States, intents, and the transition table for the sales call flow. Every
//! non-terminal state carries an explicit default transition so no
//! (state, intent) pair can fall through silently; a state with neither an
//! entry nor a default resolves to `End`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Conversation state within a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Confirm the right person and open the conversation
    #[default]
    Greeting,
    /// Present the offer and its value
    ValuePitch,
    /// Gather timeline, budget, volume, decision authority
    Qualify,
    /// Address concerns about price, timing, or value
    ObjectionHandling,
    /// Book a meeting or schedule a follow-up
    Close,
    /// Polite close; terminal
    End,
}

/// Caller intent labels produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Interested,
    NotInterested,
    Objection,
    Question,
    Schedule,
    Callback,
    NotDecisionMaker,
    WrongPerson,
    RequestInfo,
    #[default]
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interested => "interested",
            Self::NotInterested => "not_interested",
            Self::Objection => "objection",
            Self::Question => "question",
            Self::Schedule => "schedule",
            Self::Callback => "callback",
            Self::NotDecisionMaker => "not_decision_maker",
            Self::WrongPerson => "wrong_person",
            Self::RequestInfo => "request_info",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a classifier label; anything unrecognized degrades to `Unknown`
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "interested" => Self::Interested,
            "not_interested" => Self::NotInterested,
            "objection" => Self::Objection,
            "question" => Self::Question,
            "schedule" => Self::Schedule,
            "callback" => Self::Callback,
            "not_decision_maker" => Self::NotDecisionMaker,
            "wrong_person" => Self::WrongPerson,
            "request_info" => Self::RequestInfo,
            _ => Self::Unknown,
        }
    }

    /// All labels offered to the classifier
    pub fn labels() -> &'static [&'static str] {
        &[
            "interested",
            "not_interested",
            "objection",
            "question",
            "schedule",
            "callback",
            "not_decision_maker",
            "wrong_person",
            "request_info",
            "unknown",
        ]
    }
}

/// One state's transition row: explicit intent entries plus a default
struct TransitionRow {
    entries: &'static [(Intent, ConversationState)],
    default: Option<ConversationState>,
}

static TRANSITIONS: Lazy<HashMap<ConversationState, TransitionRow>> = Lazy::new(|| {
    use ConversationState::*;
    use Intent::*;

    let mut map = HashMap::new();
    map.insert(
        Greeting,
        TransitionRow {
            entries: &[
                (Interested, ValuePitch),
                (NotInterested, ObjectionHandling),
                (WrongPerson, End),
            ],
            default: Some(ValuePitch),
        },
    );
    map.insert(
        ValuePitch,
        TransitionRow {
            entries: &[
                (Interested, Qualify),
                (Question, ValuePitch),
                (Objection, ObjectionHandling),
                (NotInterested, ObjectionHandling),
            ],
            default: Some(Qualify),
        },
    );
    map.insert(
        Qualify,
        TransitionRow {
            entries: &[
                (Schedule, Close),
                (Objection, ObjectionHandling),
                (NotDecisionMaker, Close),
            ],
            default: Some(Qualify),
        },
    );
    map.insert(
        ObjectionHandling,
        TransitionRow {
            entries: &[
                (Interested, Qualify),
                (Schedule, Close),
                (NotInterested, End),
            ],
            default: Some(Qualify),
        },
    );
    map.insert(
        Close,
        TransitionRow {
            entries: &[(Schedule, End), (Callback, End)],
            default: Some(End),
        },
    );
    map.insert(
        End,
        TransitionRow {
            entries: &[],
            default: None,
        },
    );
    map
});

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::ValuePitch => "value_pitch",
            Self::Qualify => "qualify",
            Self::ObjectionHandling => "objection_handling",
            Self::Close => "close",
            Self::End => "end",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "greeting" => Some(Self::Greeting),
            "value_pitch" => Some(Self::ValuePitch),
            "qualify" => Some(Self::Qualify),
            "objection_handling" => Some(Self::ObjectionHandling),
            "close" => Some(Self::Close),
            "end" => Some(Self::End),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Look up the next state for a classified intent. Intents without an
    /// explicit entry use the row default; a state with no default is
    /// terminal and resolves to `End`.
    pub fn next(&self, intent: Intent) -> ConversationState {
        let Some(row) = TRANSITIONS.get(self) else {
            return ConversationState::End;
        };
        row.entries
            .iter()
            .find(|(i, _)| *i == intent)
            .map(|(_, s)| *s)
            .or(row.default)
            .unwrap_or(ConversationState::End)
    }

    /// Soft per-state turn budget used to bias the flow toward closing
    pub fn max_turns(&self) -> u32 {
        match self {
            Self::Greeting => 2,
            Self::ValuePitch => 3,
            Self::Qualify => 5,
            Self::ObjectionHandling => 3,
            Self::Close => 2,
            Self::End => 1,
        }
    }

    /// Where to push the conversation when a state's turn budget runs out
    /// and the table would otherwise stay in place
    pub fn budget_successor(&self) -> ConversationState {
        match self {
            Self::Greeting => Self::ValuePitch,
            Self::ValuePitch => Self::Qualify,
            Self::Qualify => Self::Close,
            Self::ObjectionHandling => Self::Close,
            Self::Close | Self::End => Self::End,
        }
    }

    /// Generic objective, used when the active script has no override
    pub fn fallback_objective(&self) -> &'static str {
        match self {
            Self::Greeting => {
                "Introduce yourself, confirm you're speaking with the right person, \
                 and mention a brief value prop."
            }
            Self::ValuePitch => {
                "Explain the concrete benefit of the offer and how it pays for itself."
            }
            Self::Qualify => {
                "Ask about volume, timeline for the work, and typical budget. \
                 One question at a time."
            }
            Self::ObjectionHandling => {
                "Address their concern empathetically and pivot to value or an \
                 alternative."
            }
            Self::Close => "Offer two specific meeting times or a booking link.",
            Self::End => "Thank them and provide opt-out instructions.",
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action the caller of the engine should take after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineAction {
    Continue,
    ContinueQualification,
    BookMeeting,
    EndCall,
}

impl EngineAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::ContinueQualification => "continue_qualification",
            Self::BookMeeting => "book_meeting",
            Self::EndCall => "end_call",
        }
    }

    /// Derive the action from the transition outcome
    pub fn determine(next_state: ConversationState, intent: Intent) -> Self {
        if next_state == ConversationState::End {
            Self::EndCall
        } else if next_state == ConversationState::Close && intent == Intent::Schedule {
            Self::BookMeeting
        } else if next_state == ConversationState::Qualify {
            Self::ContinueQualification
        } else {
            Self::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_transitions() {
        use ConversationState::*;
        assert_eq!(Greeting.next(Intent::Interested), ValuePitch);
        assert_eq!(Greeting.next(Intent::WrongPerson), End);
        assert_eq!(ValuePitch.next(Intent::Objection), ObjectionHandling);
        assert_eq!(Qualify.next(Intent::Schedule), Close);
        assert_eq!(ObjectionHandling.next(Intent::NotInterested), End);
        assert_eq!(Close.next(Intent::Callback), End);
    }

    #[test]
    fn missing_entry_uses_row_default() {
        use ConversationState::*;
        // No explicit entry for these intents in their rows
        assert_eq!(Greeting.next(Intent::Question), ValuePitch);
        assert_eq!(Qualify.next(Intent::Interested), Qualify);
        assert_eq!(ObjectionHandling.next(Intent::Unknown), Qualify);
        assert_eq!(Close.next(Intent::Objection), End);
    }

    #[test]
    fn terminal_state_has_no_outbound_transitions() {
        for intent in [
            Intent::Interested,
            Intent::Schedule,
            Intent::Unknown,
            Intent::WrongPerson,
        ] {
            assert_eq!(ConversationState::End.next(intent), ConversationState::End);
        }
    }

    #[test]
    fn intent_parse_degrades_to_unknown() {
        assert_eq!(Intent::parse("Interested"), Intent::Interested);
        assert_eq!(Intent::parse("  schedule  "), Intent::Schedule);
        assert_eq!(Intent::parse("I think they are interested"), Intent::Unknown);
        assert_eq!(Intent::parse(""), Intent::Unknown);
    }

    #[test]
    fn action_rules() {
        use ConversationState::*;
        assert_eq!(
            EngineAction::determine(End, Intent::WrongPerson),
            EngineAction::EndCall
        );
        assert_eq!(
            EngineAction::determine(Close, Intent::Schedule),
            EngineAction::BookMeeting
        );
        assert_eq!(
            EngineAction::determine(Close, Intent::NotDecisionMaker),
            EngineAction::Continue
        );
        assert_eq!(
            EngineAction::determine(Qualify, Intent::Interested),
            EngineAction::ContinueQualification
        );
        assert_eq!(
            EngineAction::determine(ValuePitch, Intent::Question),
            EngineAction::Continue
        );
    }

    #[test]
    fn budget_chain_reaches_end() {
        let mut state = ConversationState::Greeting;
        for _ in 0..6 {
            state = state.budget_successor();
        }
        assert_eq!(state, ConversationState::End);
    }
}
