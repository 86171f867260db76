//! Conversation state engine
//!
//! Advances one call's dialogue one turn at a time. Each invocation
//! classifies the caller's intent, computes the next state from the
//! transition table, generates the spoken reply, and persists an immutable
//! turn numbered `prior_turn_count + 1`.
//!
//! `(call_id, turn_number)` is the idempotency key: a duplicate webhook
//! delivery for an already-recorded turn replays the stored response
//! instead of generating a new one.

use std::sync::Arc;

use uuid::Uuid;

use dialwave_config::ScriptLibrary;
use dialwave_core::{
    Clock, ConversationState, EngineAction, Error, HistoryTurn, Intent, IntentContext,
    LanguageModel, QualificationUpdate, ReplyRequest, Result, Turn,
};
use dialwave_persistence::{CallStore, CampaignStore, ContactStore, TurnStore};

use crate::extraction::extract_qualification;

/// How many prior exchanges the reply generator sees
const HISTORY_WINDOW: usize = 6;

/// Result of processing one turn
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub response: String,
    pub next_state: ConversationState,
    pub qualification_update: Option<QualificationUpdate>,
    pub action: EngineAction,
}

/// Per-call turn state machine
pub struct ConversationStateEngine {
    calls: Arc<dyn CallStore>,
    contacts: Arc<dyn ContactStore>,
    campaigns: Arc<dyn CampaignStore>,
    turns: Arc<dyn TurnStore>,
    model: Arc<dyn LanguageModel>,
    scripts: Arc<ScriptLibrary>,
    clock: Arc<dyn Clock>,
}

impl ConversationStateEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        calls: Arc<dyn CallStore>,
        contacts: Arc<dyn ContactStore>,
        campaigns: Arc<dyn CampaignStore>,
        turns: Arc<dyn TurnStore>,
        model: Arc<dyn LanguageModel>,
        scripts: Arc<ScriptLibrary>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            calls,
            contacts,
            campaigns,
            turns,
            model,
            scripts,
            clock,
        }
    }

    /// Process one caller utterance (or the empty opener) for a call
    pub async fn process_input(
        &self,
        call_id: Uuid,
        utterance: &str,
        prior_turn_count: u32,
    ) -> Result<EngineOutput> {
        let call = self
            .calls
            .get(call_id)
            .await?
            .ok_or_else(|| Error::not_found("call", call_id.to_string()))?;
        let contact = self
            .contacts
            .get(call.contact_id)
            .await?
            .ok_or_else(|| Error::not_found("contact", call.contact_id.to_string()))?;

        let script_ref = match call.campaign_id {
            Some(campaign_id) => self
                .campaigns
                .get(campaign_id)
                .await?
                .map(|c| c.script_ref)
                .unwrap_or_default(),
            None => String::new(),
        };
        let script = self.scripts.resolve(&script_ref);

        let turn_number = prior_turn_count + 1;

        // Duplicate webhook delivery: replay the recorded turn
        if let Some(existing) = self.turns.get(call_id, turn_number).await? {
            tracing::warn!(
                call_id = %call_id,
                turn_number,
                "duplicate delivery for recorded turn, replaying stored response"
            );
            return Ok(Self::replay(existing));
        }

        let history = self.turns.list(call_id).await?;
        let current_state = history
            .last()
            .map(|t| t.state)
            .unwrap_or(ConversationState::Greeting);

        let (intent, next_state) = if utterance.trim().is_empty() && prior_turn_count == 0 {
            // Call opener: no input to classify, speak the greeting itself
            (Intent::Unknown, current_state)
        } else {
            let intent = self
                .model
                .classify_intent(
                    utterance,
                    &IntentContext {
                        state: current_state,
                        turn_count: prior_turn_count,
                    },
                )
                .await?;
            let mut next = current_state.next(intent);

            // Soft turn budget: when a state has run long and the table
            // would stay put, push toward closing
            if next == current_state {
                let turns_in_state = history
                    .iter()
                    .rev()
                    .take_while(|t| t.state == current_state)
                    .count() as u32;
                if turns_in_state >= current_state.max_turns() {
                    next = current_state.budget_successor();
                    tracing::debug!(
                        call_id = %call_id,
                        state = %current_state,
                        pushed_to = %next,
                        turns_in_state,
                        "turn budget exhausted, advancing"
                    );
                }
            }
            (intent, next)
        };

        let recent: Vec<HistoryTurn> = history
            .iter()
            .rev()
            .take(HISTORY_WINDOW)
            .rev()
            .map(|t| HistoryTurn {
                user_input: t.user_input.clone(),
                bot_response: t.bot_response.clone(),
            })
            .collect();

        // Generation failures propagate; the webhook boundary converts them
        // into the scripted termination
        let reply = self
            .model
            .generate_reply(&ReplyRequest {
                state: next_state,
                objective: script.objective(next_state),
                persona: script.persona.clone(),
                contact_name: contact.full_name.clone(),
                company: contact.company.clone(),
                history: recent,
                user_input: utterance.to_string(),
            })
            .await?;

        let turn = Turn {
            call_id,
            turn_number,
            state: next_state,
            user_input: utterance.to_string(),
            bot_response: reply.text.clone(),
            confidence: reply.confidence,
            created_at: self.clock.now(),
        };
        if !self.turns.append(&turn).await? {
            // A concurrent delivery won the race after our earlier check;
            // the stored turn is authoritative
            if let Some(existing) = self.turns.get(call_id, turn_number).await? {
                tracing::warn!(call_id = %call_id, turn_number, "lost turn append race, replaying");
                return Ok(Self::replay(existing));
            }
        }

        let qualification_update = if next_state == ConversationState::Qualify {
            let update = extract_qualification(utterance);
            if update.is_empty() {
                None
            } else {
                Some(update)
            }
        } else {
            None
        };

        let action = EngineAction::determine(next_state, intent);

        tracing::info!(
            call_id = %call_id,
            turn_number,
            state = %current_state,
            next_state = %next_state,
            intent = %intent,
            action = %action.as_str(),
            "turn processed"
        );

        Ok(EngineOutput {
            response: reply.text,
            next_state,
            qualification_update,
            action,
        })
    }

    fn replay(turn: Turn) -> EngineOutput {
        let action = if turn.state == ConversationState::End {
            EngineAction::EndCall
        } else if turn.state == ConversationState::Qualify {
            EngineAction::ContinueQualification
        } else {
            EngineAction::Continue
        };
        EngineOutput {
            response: turn.bot_response,
            next_state: turn.state,
            qualification_update: None,
            action,
        }
    }
}
