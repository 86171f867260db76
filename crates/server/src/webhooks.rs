//! Voice provider webhooks
//!
//! Every handler that speaks on a live call answers with a call-control
//! document. Failures never leave the caller in silence: any error inside
//! a live-call handler renders the scripted apology plus hangup, and the
//! call record is moved to a terminal status.

use axum::extract::{Form, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use dialwave_core::{normalize_phone, Call, CallStatus, Contact, DncEntry, EngineAction};
use dialwave_telephony::{
    calculate_call_cost, play_and_gather, speak_and_gather, terminal_message, CallControl,
};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct AnsweredForm {
    #[serde(rename = "AnsweredBy", default)]
    pub answered_by: Option<String>,
}

#[derive(Deserialize)]
pub struct InputForm {
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: Option<String>,
}

#[derive(Deserialize)]
pub struct IncomingForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "From")]
    pub from: String,
}

#[derive(Deserialize)]
pub struct StatusForm {
    #[serde(rename = "CallStatus")]
    pub call_status: String,
    #[serde(rename = "CallDuration", default)]
    pub call_duration: Option<String>,
}

#[derive(Deserialize)]
pub struct RecordingForm {
    #[serde(rename = "RecordingSid")]
    pub recording_sid: String,
}

#[derive(Deserialize)]
pub struct OptOutForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
}

fn xml(control: CallControl) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], control.into_xml()).into_response()
}

fn fallback_voice(state: &AppState) -> &str {
    &state.config.telephony.fallback_voice
}

/// Scripted apology plus hangup, the universal in-call failure answer
fn apology(state: &AppState) -> Response {
    let script = state.scripts.default_script();
    xml(terminal_message(
        &[script.apology_line.as_str()],
        fallback_voice(state),
    ))
}

/// Move a call to `failed` so it is never left `in_progress`
async fn fail_call(state: &AppState, call_id: Uuid, outcome: &str) {
    match state.store.calls.get(call_id).await {
        Ok(Some(mut call)) if !call.status.is_terminal() => {
            call.status = CallStatus::Failed;
            call.outcome = Some(outcome.to_string());
            call.ended_at = Some(state.clock.now());
            if let Err(e) = state.store.calls.upsert(&call).await {
                tracing::error!(call_id = %call_id, error = %e, "failed to mark call failed");
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(call_id = %call_id, error = %e, "failed to load call for failure");
        }
    }
}

/// Speak or play the reply, preferring synthesized audio
async fn respond_and_gather(state: &AppState, call_id: Uuid, text: &str) -> Response {
    let script = state.scripts.default_script();
    let action = format!("/webhooks/voice/input/{call_id}");
    match state.speech.synthesize(text, &script.voice_profile).await {
        Ok(Some(audio_url)) => xml(play_and_gather(&audio_url, &action)),
        Ok(None) => xml(speak_and_gather(text, fallback_voice(state), &action)),
        Err(e) => {
            tracing::warn!(call_id = %call_id, error = %e, "synthesis failed, using fallback voice");
            xml(speak_and_gather(text, fallback_voice(state), &action))
        }
    }
}

/// Outbound call answered: drop voicemail on machines, open the
/// conversation with a human
pub async fn call_answered(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
    Form(form): Form<AnsweredForm>,
) -> Response {
    let answered_by = form.answered_by.unwrap_or_default();
    tracing::info!(call_id = %call_id, answered_by = %answered_by, "outbound call answered");

    let call = match state.store.calls.get(call_id).await {
        Ok(Some(call)) => call,
        Ok(None) => {
            tracing::warn!(call_id = %call_id, "answered webhook for unknown call");
            return apology(&state);
        }
        Err(e) => {
            tracing::error!(call_id = %call_id, error = %e, "store failure on answered webhook");
            return apology(&state);
        }
    };

    if matches!(
        answered_by.as_str(),
        "machine_end_beep" | "machine_end_silence"
    ) {
        let script = state.scripts.default_script();
        let mut call = call;
        call.status = CallStatus::Voicemail;
        call.outcome = Some("machine_detected".to_string());
        call.ended_at = Some(state.clock.now());
        if let Err(e) = state.store.calls.upsert(&call).await {
            tracing::error!(call_id = %call_id, error = %e, "failed to record voicemail outcome");
        }
        return xml(terminal_message(
            &[script.voicemail_message.as_str()],
            fallback_voice(&state),
        ));
    }

    match state.engine.process_input(call_id, "", 0).await {
        Ok(output) => {
            let mut call = call;
            call.status = CallStatus::InProgress;
            call.started_at = Some(state.clock.now());
            if let Err(e) = state.store.calls.upsert(&call).await {
                tracing::error!(call_id = %call_id, error = %e, "failed to mark call in progress");
            }
            mark_contacted(&state, call.contact_id).await;
            respond_and_gather(&state, call_id, &output.response).await
        }
        Err(e) => {
            tracing::error!(call_id = %call_id, error = %e, "greeting turn failed");
            fail_call(&state, call_id, "greeting_error").await;
            apology(&state)
        }
    }
}

/// Advance a fresh contact to `contacted` once a human answers
async fn mark_contacted(state: &AppState, contact_id: Uuid) {
    match state.store.contacts.get(contact_id).await {
        Ok(Some(contact)) if contact.status == dialwave_core::ContactStatus::New => {
            if let Err(e) = state
                .store
                .contacts
                .set_status(contact_id, dialwave_core::ContactStatus::Contacted)
                .await
            {
                tracing::warn!(contact_id = %contact_id, error = %e, "failed to mark contacted");
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(contact_id = %contact_id, error = %e, "contact lookup failed");
        }
    }
}

/// Captured caller speech: advance the conversation one turn
pub async fn call_input(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
    Form(form): Form<InputForm>,
) -> Response {
    let utterance = form.speech_result.unwrap_or_default();
    tracing::info!(call_id = %call_id, utterance = %utterance, "processing caller input");

    let call = match state.store.calls.get(call_id).await {
        Ok(Some(call)) => call,
        Ok(None) => {
            tracing::warn!(call_id = %call_id, "input webhook for unknown call");
            return apology(&state);
        }
        Err(e) => {
            tracing::error!(call_id = %call_id, error = %e, "store failure on input webhook");
            return apology(&state);
        }
    };

    let prior = match state.store.turns.count(call_id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(call_id = %call_id, error = %e, "failed to count turns");
            fail_call(&state, call_id, "turn_count_error").await;
            return apology(&state);
        }
    };

    let output = match state.engine.process_input(call_id, &utterance, prior).await {
        Ok(output) => output,
        Err(e) => {
            // Scripted termination instead of a silent drop; the record
            // must not stay in_progress
            tracing::error!(call_id = %call_id, error = %e, "turn processing failed");
            fail_call(&state, call_id, "dialogue_error").await;
            return apology(&state);
        }
    };
    metrics::counter!("dialwave_turns_total").increment(1);

    if let Some(update) = &output.qualification_update {
        // Evaluator failures never interrupt the live call
        if let Err(e) = state.evaluator.qualify_lead(call.contact_id, update).await {
            tracing::warn!(
                call_id = %call_id,
                contact_id = %call.contact_id,
                error = %e,
                "lead qualification failed"
            );
        }
    }

    if output.action == EngineAction::EndCall {
        let script = state.scripts.default_script();
        let mut call = call;
        call.status = CallStatus::Completed;
        call.outcome = Some(output.next_state.as_str().to_string());
        call.ended_at = Some(state.clock.now());
        if let Err(e) = state.store.calls.upsert(&call).await {
            tracing::error!(call_id = %call_id, error = %e, "failed to complete call");
        }
        return xml(terminal_message(
            &[output.response.as_str(), script.closing_line.as_str()],
            fallback_voice(&state),
        ));
    }

    respond_and_gather(&state, call_id, &output.response).await
}

/// Inbound call: find or create the contact, open the conversation
pub async fn incoming_call(
    State(state): State<AppState>,
    Form(form): Form<IncomingForm>,
) -> Response {
    tracing::info!(call_sid = %form.call_sid, from = %form.from, "incoming call");

    let phone = match normalize_phone(&form.from) {
        Ok(phone) => phone,
        Err(e) => {
            tracing::warn!(from = %form.from, error = %e, "unparseable caller number");
            return apology(&state);
        }
    };

    let contact = match state.store.contacts.find_by_phone(&phone).await {
        Ok(Some(contact)) => contact,
        Ok(None) => {
            let contact = Contact::new(phone.clone(), String::new());
            if let Err(e) = state.store.contacts.upsert(&contact).await {
                tracing::error!(phone = %phone, error = %e, "failed to create inbound contact");
                return apology(&state);
            }
            contact
        }
        Err(e) => {
            tracing::error!(phone = %phone, error = %e, "contact lookup failed");
            return apology(&state);
        }
    };

    let mut call = Call::inbound(contact.id);
    call.external_ref = Some(form.call_sid);
    call.status = CallStatus::InProgress;
    call.started_at = Some(state.clock.now());
    if let Err(e) = state.store.calls.upsert(&call).await {
        tracing::error!(contact_id = %contact.id, error = %e, "failed to create inbound call");
        return apology(&state);
    }

    match state.engine.process_input(call.id, "", 0).await {
        Ok(output) => respond_and_gather(&state, call.id, &output.response).await,
        Err(e) => {
            tracing::error!(call_id = %call.id, error = %e, "inbound greeting failed");
            fail_call(&state, call.id, "greeting_error").await;
            apology(&state)
        }
    }
}

/// Provider status callback: map the status, capture duration and cost
pub async fn call_status(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
    Form(form): Form<StatusForm>,
) -> &'static str {
    let Ok(Some(mut call)) = state.store.calls.get(call_id).await else {
        tracing::warn!(call_id = %call_id, "status webhook for unknown call");
        return "OK";
    };

    // Terminal records are immutable
    if call.status.is_terminal() {
        return "OK";
    }

    let Some(status) = CallStatus::parse(&form.call_status.to_lowercase()) else {
        tracing::warn!(call_id = %call_id, status = %form.call_status, "unknown provider status");
        return "OK";
    };

    call.status = status;
    if let Some(duration) = form.call_duration.as_deref().and_then(|d| d.parse().ok()) {
        call.duration_seconds = duration;
    }

    if status == CallStatus::Completed {
        call.ended_at = Some(state.clock.now());
        let price_per_minute = state.config.telephony.price_per_minute;
        call.costs.telephony = match &call.external_ref {
            Some(external_ref) => match state.telephony.call_details(external_ref).await {
                Ok(details) => details
                    .price
                    .map(f64::abs)
                    .unwrap_or_else(|| calculate_call_cost(call.duration_seconds, price_per_minute)),
                Err(e) => {
                    tracing::warn!(call_id = %call_id, error = %e, "failed to fetch call details");
                    calculate_call_cost(call.duration_seconds, price_per_minute)
                }
            },
            None => calculate_call_cost(call.duration_seconds, price_per_minute),
        };
    }

    if let Err(e) = state.store.calls.upsert(&call).await {
        tracing::error!(call_id = %call_id, error = %e, "failed to update call status");
    }
    "OK"
}

/// Recording ready: attach the fetchable URL
pub async fn call_recording(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
    Form(form): Form<RecordingForm>,
) -> &'static str {
    let Ok(Some(mut call)) = state.store.calls.get(call_id).await else {
        tracing::warn!(call_id = %call_id, "recording webhook for unknown call");
        return "OK";
    };

    match state.telephony.recording_url(&form.recording_sid).await {
        Ok(url) => {
            call.recording_url = Some(url);
            if let Err(e) = state.store.calls.upsert(&call).await {
                tracing::error!(call_id = %call_id, error = %e, "failed to attach recording");
            }
        }
        Err(e) => {
            tracing::warn!(call_id = %call_id, error = %e, "failed to resolve recording url");
        }
    }
    "OK"
}

/// SMS opt-out: flag the contact, append to the DNC ledger, confirm
pub async fn sms_opt_out(
    State(state): State<AppState>,
    Form(form): Form<OptOutForm>,
) -> &'static str {
    let body = form.body.unwrap_or_default();
    if !body.to_lowercase().contains("stop") {
        return "OK";
    }

    let Ok(phone) = normalize_phone(&form.from) else {
        tracing::warn!(from = %form.from, "unparseable opt-out number");
        return "OK";
    };

    match state.store.contacts.find_by_phone(&phone).await {
        Ok(Some(contact)) => {
            if let Err(e) = state
                .gate
                .record_opt_out(contact.id, &phone, "sms_opt_out", "sms")
                .await
            {
                tracing::error!(phone = %phone, error = %e, "failed to record opt-out");
            }
        }
        Ok(None) => {
            // No contact record; the ledger entry alone blocks future dials
            let entry = DncEntry {
                phone: phone.clone(),
                reason: "sms_opt_out".to_string(),
                source: "sms".to_string(),
                created_at: state.clock.now(),
            };
            if let Err(e) = state.store.dnc.add(&entry).await {
                tracing::error!(phone = %phone, error = %e, "failed to append DNC entry");
            }
        }
        Err(e) => {
            tracing::error!(phone = %phone, error = %e, "opt-out contact lookup failed");
        }
    }

    let confirmation = &state.scripts.default_script().opt_out_confirmation_sms;
    if let Err(e) = state.telephony.send_message(&phone, confirmation).await {
        tracing::warn!(phone = %phone, error = %e, "failed to send opt-out confirmation");
    }
    "OK"
}
