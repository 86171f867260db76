//! End-to-end tests for the conversation engine and lead evaluator
//!
//! Runs the real engine against in-memory stores with a scripted language
//! model, covering the turn lifecycle, transition fallbacks, qualification
//! extraction, and evaluator idempotency.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use dialwave_config::ScriptLibrary;
use dialwave_core::{
    Call, Campaign, CampaignStatus, Clock, Contact, ContactStatus, ConversationState,
    EngineAction, Error, GeneratedReply, Intent, IntentContext, LanguageModel, ManualClock,
    ProviderCallDetails, ReplyRequest, Result, Telephony, Turn,
};
use dialwave_dialogue::{ConversationStateEngine, LeadQualificationEvaluator, NextAction};
use dialwave_integrations::{CrmConnector, CrmContact, CrmDeal, IntegrationError};
use dialwave_persistence::PersistenceLayer;

/// Language model with a scripted intent queue
struct ScriptedModel {
    intents: Mutex<VecDeque<Intent>>,
    fail_generation: AtomicBool,
}

impl ScriptedModel {
    fn new(intents: Vec<Intent>) -> Arc<Self> {
        Arc::new(Self {
            intents: Mutex::new(intents.into()),
            fail_generation: AtomicBool::new(false),
        })
    }

    fn fail_next_generation(&self) {
        self.fail_generation.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn classify_intent(&self, _utterance: &str, _context: &IntentContext) -> Result<Intent> {
        Ok(self.intents.lock().pop_front().unwrap_or(Intent::Unknown))
    }

    async fn generate_reply(&self, request: &ReplyRequest) -> Result<GeneratedReply> {
        if self.fail_generation.swap(false, Ordering::SeqCst) {
            return Err(Error::Provider("model overloaded".to_string()));
        }
        Ok(GeneratedReply {
            text: format!("({}) scripted reply", request.state),
            confidence: 0.85,
        })
    }
}

/// Telephony mock recording outbound SMS
#[derive(Default)]
struct RecordingTelephony {
    messages: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Telephony for RecordingTelephony {
    async fn initiate_call(&self, _contact: &Contact, _call_id: Uuid) -> Result<String> {
        Ok("CA-test".to_string())
    }

    async fn send_message(&self, phone: &str, body: &str) -> Result<()> {
        self.messages.lock().push((phone.to_string(), body.to_string()));
        Ok(())
    }

    async fn call_details(&self, _external_ref: &str) -> Result<ProviderCallDetails> {
        Ok(ProviderCallDetails::default())
    }

    async fn recording_url(&self, _recording_ref: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// CRM mock counting operations
#[derive(Default)]
struct CountingCrm {
    upserts: AtomicUsize,
    deals: AtomicUsize,
    enrollments: AtomicUsize,
}

#[async_trait]
impl CrmConnector for CountingCrm {
    async fn upsert_contact(&self, _contact: &CrmContact) -> std::result::Result<(), IntegrationError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_deal(&self, _deal: &CrmDeal) -> std::result::Result<(), IntegrationError> {
        self.deals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn enroll_in_sequence(
        &self,
        _email: &str,
        _sequence_id: &str,
    ) -> std::result::Result<(), IntegrationError> {
        self.enrollments.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    store: PersistenceLayer,
    model: Arc<ScriptedModel>,
    telephony: Arc<RecordingTelephony>,
    crm: Arc<CountingCrm>,
    engine: ConversationStateEngine,
    evaluator: LeadQualificationEvaluator,
    campaign: Campaign,
    contact: Contact,
    call: Call,
}

async fn harness(intents: Vec<Intent>) -> Harness {
    let store = PersistenceLayer::in_memory();
    let model = ScriptedModel::new(intents);
    let telephony = Arc::new(RecordingTelephony::default());
    let crm = Arc::new(CountingCrm::default());
    let scripts = Arc::new(ScriptLibrary::with_default());
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let mut campaign = Campaign::new("Spring brokers", "default");
    campaign.status = CampaignStatus::Active;
    store.campaigns.upsert(&campaign).await.unwrap();

    let mut contact = Contact::new("+19135550142", "Dana Reeve");
    contact.company = "Reeve Commercial".to_string();
    contact.campaign_id = Some(campaign.id);
    store.contacts.upsert(&contact).await.unwrap();

    let call = Call::outbound(contact.id, Some(campaign.id));
    store.calls.upsert(&call).await.unwrap();

    let engine = ConversationStateEngine::new(
        store.calls.clone(),
        store.contacts.clone(),
        store.campaigns.clone(),
        store.turns.clone(),
        model.clone(),
        scripts.clone(),
        clock.clone() as Arc<dyn Clock>,
    );

    let evaluator = LeadQualificationEvaluator::new(
        store.contacts.clone(),
        store.qualifications.clone(),
        crm.clone(),
        telephony.clone(),
        scripts,
        "media_services_nurture",
        clock as Arc<dyn Clock>,
    );

    Harness {
        store,
        model,
        telephony,
        crm,
        engine,
        evaluator,
        campaign,
        contact,
        call,
    }
}

async fn seed_turn(h: &Harness, turn_number: u32, state: ConversationState) {
    let turn = Turn {
        call_id: h.call.id,
        turn_number,
        state,
        user_input: format!("seeded input {turn_number}"),
        bot_response: format!("seeded reply {turn_number}"),
        confidence: 0.85,
        created_at: Utc::now(),
    };
    assert!(h.store.turns.append(&turn).await.unwrap());
}

#[tokio::test]
async fn empty_opener_produces_the_greeting() {
    let h = harness(vec![]).await;

    let output = h.engine.process_input(h.call.id, "", 0).await.unwrap();

    assert_eq!(output.next_state, ConversationState::Greeting);
    assert_eq!(output.action, EngineAction::Continue);
    assert!(output.response.contains("greeting"));
    assert_eq!(h.store.turns.count(h.call.id).await.unwrap(), 1);

    let campaign = h.store.campaigns.get(h.campaign.id).await.unwrap().unwrap();
    assert_eq!(campaign.status, CampaignStatus::Active);
}

#[tokio::test]
async fn wrong_person_in_greeting_ends_the_call() {
    // Scenario: classified intent wrong_person while in greeting
    let h = harness(vec![Intent::WrongPerson]).await;
    seed_turn(&h, 1, ConversationState::Greeting).await;

    let output = h
        .engine
        .process_input(h.call.id, "No, there's no Dana here", 1)
        .await
        .unwrap();

    assert_eq!(output.next_state, ConversationState::End);
    assert_eq!(output.action, EngineAction::EndCall);
}

#[tokio::test]
async fn qualify_turn_extracts_and_qualifies() {
    // Scenario: qualification utterance while in qualify
    let h = harness(vec![Intent::Unknown]).await;
    seed_turn(&h, 1, ConversationState::Greeting).await;
    seed_turn(&h, 2, ConversationState::ValuePitch).await;
    seed_turn(&h, 3, ConversationState::Qualify).await;

    let output = h
        .engine
        .process_input(
            h.call.id,
            "We have 6 properties and need something within 30 days, budget around $3000",
            3,
        )
        .await
        .unwrap();

    assert_eq!(output.next_state, ConversationState::Qualify);
    assert_eq!(output.action, EngineAction::ContinueQualification);
    let update = output.qualification_update.expect("signals extracted");
    assert_eq!(update.properties_count, Some(6));

    let outcome = h
        .evaluator
        .qualify_lead(h.contact.id, &update)
        .await
        .unwrap();
    assert!(outcome.qualified);
    assert!(outcome.score >= 22);
    assert_eq!(outcome.next_action, NextAction::BookMeeting);

    let contact = h.store.contacts.get(h.contact.id).await.unwrap().unwrap();
    assert_eq!(contact.status, ContactStatus::Qualified);

    // Qualified lead side effects: CRM upsert + deal + booking SMS
    assert_eq!(h.crm.upserts.load(Ordering::SeqCst), 1);
    assert_eq!(h.crm.deals.load(Ordering::SeqCst), 1);
    assert_eq!(h.telephony.messages.lock().len(), 1);
    assert!(h.telephony.messages.lock()[0].1.contains("Dana Reeve"));
}

#[tokio::test]
async fn schedule_from_qualify_books_a_meeting() {
    let h = harness(vec![Intent::Schedule]).await;
    seed_turn(&h, 1, ConversationState::Greeting).await;
    seed_turn(&h, 2, ConversationState::Qualify).await;

    let output = h
        .engine
        .process_input(h.call.id, "sure, let's set something up", 2)
        .await
        .unwrap();

    assert_eq!(output.next_state, ConversationState::Close);
    assert_eq!(output.action, EngineAction::BookMeeting);
}

#[tokio::test]
async fn turn_numbers_stay_contiguous() {
    let h = harness(vec![Intent::Interested, Intent::Interested]).await;

    h.engine.process_input(h.call.id, "", 0).await.unwrap();
    h.engine
        .process_input(h.call.id, "sounds interesting", 1)
        .await
        .unwrap();
    h.engine
        .process_input(h.call.id, "go on", 2)
        .await
        .unwrap();

    let turns = h.store.turns.list(h.call.id).await.unwrap();
    let numbers: Vec<u32> = turns.iter().map(|t| t.turn_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn duplicate_delivery_replays_the_stored_turn() {
    let h = harness(vec![Intent::Interested]).await;
    seed_turn(&h, 1, ConversationState::Greeting).await;

    let first = h
        .engine
        .process_input(h.call.id, "tell me more", 1)
        .await
        .unwrap();
    let second = h
        .engine
        .process_input(h.call.id, "tell me more", 1)
        .await
        .unwrap();

    assert_eq!(first.response, second.response);
    assert_eq!(first.next_state, second.next_state);
    assert_eq!(h.store.turns.count(h.call.id).await.unwrap(), 2);
}

#[tokio::test]
async fn generation_failure_propagates_to_the_caller() {
    let h = harness(vec![Intent::Question]).await;
    seed_turn(&h, 1, ConversationState::ValuePitch).await;
    h.model.fail_next_generation();

    let err = h
        .engine
        .process_input(h.call.id, "what does it cost?", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider(_)));

    // The failed turn is not recorded; a retry keeps numbering contiguous
    assert_eq!(h.store.turns.count(h.call.id).await.unwrap(), 1);
}

#[tokio::test]
async fn missing_call_is_not_found() {
    let h = harness(vec![]).await;
    let err = h
        .engine
        .process_input(Uuid::new_v4(), "hello", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn exhausted_qualify_budget_pushes_to_close() {
    let h = harness(vec![Intent::Unknown]).await;
    seed_turn(&h, 1, ConversationState::Greeting).await;
    for n in 2..=6 {
        seed_turn(&h, n, ConversationState::Qualify).await;
    }

    let output = h
        .engine
        .process_input(h.call.id, "well, maybe", 6)
        .await
        .unwrap();
    assert_eq!(output.next_state, ConversationState::Close);
}

#[tokio::test]
async fn qualify_lead_is_idempotent() {
    let h = harness(vec![]).await;
    let update = dialwave_dialogue::extract_qualification(
        "We have 6 properties and need something within 30 days, budget around $3000",
    );

    let first = h.evaluator.qualify_lead(h.contact.id, &update).await.unwrap();
    let second = h.evaluator.qualify_lead(h.contact.id, &update).await.unwrap();

    assert_eq!(first.score, second.score);
    assert_eq!(first.status, second.status);
    assert!(second.qualified);

    let contact = h.store.contacts.get(h.contact.id).await.unwrap().unwrap();
    assert_eq!(contact.status, ContactStatus::Qualified);

    // Side effects fired only on the status transition
    assert_eq!(h.crm.upserts.load(Ordering::SeqCst), 1);
    assert_eq!(h.crm.deals.load(Ordering::SeqCst), 1);
    assert_eq!(h.telephony.messages.lock().len(), 1);
}

#[tokio::test]
async fn mid_score_leads_are_nurtured() {
    let h = harness(vec![]).await;
    // Video (+5) and photos (+3) plus a small property pool (+5) lands in
    // nurture territory without timeline or budget
    let update = dialwave_dialogue::extract_qualification(
        "we'd want aerial footage and some photos for our 3 buildings",
    );

    let outcome = h.evaluator.qualify_lead(h.contact.id, &update).await.unwrap();
    assert!(!outcome.qualified);
    assert_eq!(outcome.status, ContactStatus::Nurture);
    assert_eq!(outcome.next_action, NextAction::ScheduleCallback);
    assert_eq!(h.crm.enrollments.load(Ordering::SeqCst), 1);
    assert_eq!(h.telephony.messages.lock().len(), 1);
    assert_eq!(outcome.reason.as_deref(), Some("Timeline too far out"));
}
