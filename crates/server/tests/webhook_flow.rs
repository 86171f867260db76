//! Webhook boundary tests
//!
//! Exercise the provider webhook handlers against a fully wired AppState
//! with in-memory stores and scripted collaborators. The central property:
//! a live call always ends with an audible scripted line, never silence,
//! and its record never stays in_progress after a failure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::{Form, Path, State};
use axum::response::IntoResponse;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use dialwave_config::{ScriptLibrary, Settings};
use dialwave_core::{
    Call, CallStatus, Campaign, CampaignStatus, Clock, Contact, ContactStatus, Error,
    GeneratedReply, Intent, IntentContext, LanguageModel, ManualClock, ProviderCallDetails,
    ReplyRequest, Result, Telephony,
};
use dialwave_persistence::PersistenceLayer;
use dialwave_server::webhooks::{
    self, AnsweredForm, IncomingForm, InputForm, OptOutForm, StatusForm,
};
use dialwave_server::AppState;
use dialwave_telephony::{AudioCache, NoopSpeech};

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
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn classify_intent(&self, _utterance: &str, _context: &IntentContext) -> Result<Intent> {
        Ok(self.intents.lock().pop_front().unwrap_or(Intent::Unknown))
    }

    async fn generate_reply(&self, request: &ReplyRequest) -> Result<GeneratedReply> {
        if self.fail_generation.load(Ordering::SeqCst) {
            return Err(Error::Provider("model overloaded".to_string()));
        }
        Ok(GeneratedReply {
            text: format!("({}) scripted reply", request.state),
            confidence: 0.85,
        })
    }
}

#[derive(Default)]
struct StubTelephony {
    messages: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Telephony for StubTelephony {
    async fn initiate_call(&self, _contact: &Contact, call_id: Uuid) -> Result<String> {
        Ok(format!("CA-{call_id}"))
    }

    async fn send_message(&self, phone: &str, body: &str) -> Result<()> {
        self.messages.lock().push((phone.to_string(), body.to_string()));
        Ok(())
    }

    async fn call_details(&self, _external_ref: &str) -> Result<ProviderCallDetails> {
        Ok(ProviderCallDetails {
            duration_seconds: 180,
            status: "completed".to_string(),
            price: Some(-0.026),
            answered_by: None,
        })
    }

    async fn recording_url(&self, recording_ref: &str) -> Result<String> {
        Ok(format!("https://recordings.test/{recording_ref}.mp3"))
    }
}

struct Harness {
    state: AppState,
    model: Arc<ScriptedModel>,
    telephony: Arc<StubTelephony>,
    contact: Contact,
    call: Call,
}

async fn harness(intents: Vec<Intent>) -> Harness {
    let store = PersistenceLayer::in_memory();
    let model = ScriptedModel::new(intents);
    let telephony = Arc::new(StubTelephony::default());
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let mut campaign = Campaign::new("Spring brokers", "default");
    campaign.status = CampaignStatus::Active;
    store.campaigns.upsert(&campaign).await.unwrap();

    let mut contact = Contact::new("+19135550142", "Dana Reeve");
    contact.company = "Reeve Commercial".to_string();
    contact.campaign_id = Some(campaign.id);
    store.contacts.upsert(&contact).await.unwrap();

    let mut call = Call::outbound(contact.id, Some(campaign.id));
    call.external_ref = Some("CA-seed".to_string());
    call.status = CallStatus::InProgress;
    call.started_at = Some(clock.now());
    store.calls.upsert(&call).await.unwrap();

    let state = AppState::assemble(
        Settings::default(),
        store,
        Arc::new(ScriptLibrary::with_default()),
        model.clone(),
        telephony.clone(),
        Arc::new(NoopSpeech),
        Arc::new(dialwave_integrations::NoopCrm),
        clock as Arc<dyn Clock>,
        Arc::new(AudioCache::new()),
        None,
    );

    Harness {
        state,
        model,
        telephony,
        contact,
        call,
    }
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn caller_input_advances_and_gathers_again() {
    let h = harness(vec![Intent::Interested]).await;

    let response = webhooks::call_input(
        State(h.state.clone()),
        Path(h.call.id),
        Form(InputForm {
            speech_result: Some("sounds interesting".to_string()),
        }),
    )
    .await;

    let xml = body_text(response).await;
    assert!(xml.contains("scripted reply"));
    assert!(xml.contains("<Gather"));
    assert!(!xml.contains("<Hangup/>"));

    let call = h.state.store.calls.get(h.call.id).await.unwrap().unwrap();
    assert_eq!(call.status, CallStatus::InProgress);
}

#[tokio::test]
async fn generation_failure_ends_with_scripted_apology() {
    // The call must end with an audible line and a terminal record
    let h = harness(vec![Intent::Question]).await;
    h.model.fail_generation.store(true, Ordering::SeqCst);

    let response = webhooks::call_input(
        State(h.state.clone()),
        Path(h.call.id),
        Form(InputForm {
            speech_result: Some("what does it cost?".to_string()),
        }),
    )
    .await;

    let xml = body_text(response).await;
    assert!(xml.contains("technical difficulties"));
    assert!(xml.contains("<Hangup/>"));

    let call = h.state.store.calls.get(h.call.id).await.unwrap().unwrap();
    assert_eq!(call.status, CallStatus::Failed);
    assert!(call.ended_at.is_some());
}

#[tokio::test]
async fn end_action_completes_the_call() {
    let h = harness(vec![Intent::WrongPerson]).await;

    let response = webhooks::call_input(
        State(h.state.clone()),
        Path(h.call.id),
        Form(InputForm {
            speech_result: Some("there's no Dana here".to_string()),
        }),
    )
    .await;

    let xml = body_text(response).await;
    assert!(xml.contains("<Hangup/>"));
    assert!(xml.contains("Have a great day!"));

    let call = h.state.store.calls.get(h.call.id).await.unwrap().unwrap();
    assert_eq!(call.status, CallStatus::Completed);
    assert_eq!(call.outcome.as_deref(), Some("end"));
    assert!(call.ended_at.is_some());
}

#[tokio::test]
async fn qualification_flows_into_the_evaluator() {
    let h = harness(vec![Intent::Unknown]).await;
    // Put the call into the qualify state first
    let turn = dialwave_core::Turn {
        call_id: h.call.id,
        turn_number: 1,
        state: dialwave_core::ConversationState::Qualify,
        user_input: "seed".to_string(),
        bot_response: "seed".to_string(),
        confidence: 0.85,
        created_at: Utc::now(),
    };
    h.state.store.turns.append(&turn).await.unwrap();

    webhooks::call_input(
        State(h.state.clone()),
        Path(h.call.id),
        Form(InputForm {
            speech_result: Some(
                "We have 6 properties and need something within 30 days, budget around $3000"
                    .to_string(),
            ),
        }),
    )
    .await;

    let contact = h
        .state
        .store
        .contacts
        .get(h.contact.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contact.status, ContactStatus::Qualified);
    // Booking SMS went out
    assert_eq!(h.telephony.messages.lock().len(), 1);
}

#[tokio::test]
async fn machine_answer_drops_voicemail() {
    let h = harness(vec![]).await;

    let response = webhooks::call_answered(
        State(h.state.clone()),
        Path(h.call.id),
        Form(AnsweredForm {
            answered_by: Some("machine_end_beep".to_string()),
        }),
    )
    .await;

    let xml = body_text(response).await;
    assert!(xml.contains("drone photography"));
    assert!(xml.contains("<Hangup/>"));

    let call = h.state.store.calls.get(h.call.id).await.unwrap().unwrap();
    assert_eq!(call.status, CallStatus::Voicemail);
    assert_eq!(call.outcome.as_deref(), Some("machine_detected"));
}

#[tokio::test]
async fn human_answer_opens_with_greeting() {
    let h = harness(vec![]).await;

    let response = webhooks::call_answered(
        State(h.state.clone()),
        Path(h.call.id),
        Form(AnsweredForm { answered_by: None }),
    )
    .await;

    let xml = body_text(response).await;
    assert!(xml.contains("(greeting) scripted reply"));
    assert!(xml.contains("<Gather"));

    let call = h.state.store.calls.get(h.call.id).await.unwrap().unwrap();
    assert_eq!(call.status, CallStatus::InProgress);

    let contact = h.state.store.contacts.get(h.contact.id).await.unwrap().unwrap();
    assert_eq!(contact.status, ContactStatus::Contacted);
}

#[tokio::test]
async fn incoming_call_creates_contact_and_greets() {
    let h = harness(vec![]).await;

    let response = webhooks::incoming_call(
        State(h.state.clone()),
        Form(IncomingForm {
            call_sid: "CA-inbound".to_string(),
            from: "(816) 555-0100".to_string(),
        }),
    )
    .await;

    let xml = body_text(response).await;
    assert!(xml.contains("(greeting) scripted reply"));

    let contact = h
        .state
        .store
        .contacts
        .find_by_phone("+18165550100")
        .await
        .unwrap()
        .expect("inbound contact created");
    assert_eq!(contact.status, ContactStatus::New);
}

#[tokio::test]
async fn completed_status_records_duration_and_cost() {
    let h = harness(vec![]).await;

    webhooks::call_status(
        State(h.state.clone()),
        Path(h.call.id),
        Form(StatusForm {
            call_status: "completed".to_string(),
            call_duration: Some("180".to_string()),
        }),
    )
    .await;

    let call = h.state.store.calls.get(h.call.id).await.unwrap().unwrap();
    assert_eq!(call.status, CallStatus::Completed);
    assert_eq!(call.duration_seconds, 180);
    // Provider price is reported negative; stored as a positive cost
    assert!((call.costs.telephony - 0.026).abs() < 1e-9);
    assert!(call.ended_at.is_some());
}

#[tokio::test]
async fn terminal_status_is_never_downgraded() {
    let h = harness(vec![]).await;
    let mut call = h.call.clone();
    call.status = CallStatus::Completed;
    call.duration_seconds = 60;
    h.state.store.calls.upsert(&call).await.unwrap();

    webhooks::call_status(
        State(h.state.clone()),
        Path(call.id),
        Form(StatusForm {
            call_status: "ringing".to_string(),
            call_duration: None,
        }),
    )
    .await;

    let stored = h.state.store.calls.get(call.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CallStatus::Completed);
    assert_eq!(stored.duration_seconds, 60);
}

#[tokio::test]
async fn sms_stop_flags_contact_and_ledger() {
    let h = harness(vec![]).await;

    webhooks::sms_opt_out(
        State(h.state.clone()),
        Form(OptOutForm {
            from: h.contact.phone.clone(),
            body: Some("STOP calling me".to_string()),
        }),
    )
    .await;

    let contact = h.state.store.contacts.get(h.contact.id).await.unwrap().unwrap();
    assert!(contact.dnc);
    assert!(h.state.store.dnc.contains(&h.contact.phone).await.unwrap());
    // Confirmation SMS
    assert_eq!(h.telephony.messages.lock().len(), 1);
    assert!(h.telephony.messages.lock()[0].1.contains("removed"));
}

#[tokio::test]
async fn non_stop_sms_is_ignored() {
    let h = harness(vec![]).await;

    webhooks::sms_opt_out(
        State(h.state.clone()),
        Form(OptOutForm {
            from: h.contact.phone.clone(),
            body: Some("tell me more".to_string()),
        }),
    )
    .await;

    let contact = h.state.store.contacts.get(h.contact.id).await.unwrap().unwrap();
    assert!(!contact.dnc);
    assert!(h.telephony.messages.lock().is_empty());
}
