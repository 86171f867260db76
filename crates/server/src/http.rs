//! HTTP endpoints
//!
//! Campaign control and monitoring API, plus the media route the voice
//! provider fetches synthesized audio from.

use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use dialwave_core::{
    normalize_phone, Campaign, Contact, ContactStatus, Error, RetryPolicy,
};
use dialwave_dispatch::StartSummary;

use crate::error::ServerError;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::webhooks;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(
        &state.config.server.cors_origins,
        state.config.server.cors_enabled,
    );

    Router::new()
        // Campaign control surface
        .route("/api/campaigns", post(create_campaign).get(list_campaigns))
        .route("/api/campaigns/:id/start", post(start_campaign))
        .route("/api/campaigns/:id/stop", post(stop_campaign))
        .route("/api/campaigns/:id/stats", get(campaign_stats))
        // Contacts
        .route("/api/contacts", post(create_contact))
        // Monitoring
        .route("/api/calls/active", get(active_calls))
        // Provider webhooks
        .route("/webhooks/voice/incoming", post(webhooks::incoming_call))
        .route(
            "/webhooks/voice/answered/:call_id",
            post(webhooks::call_answered),
        )
        .route("/webhooks/voice/input/:call_id", post(webhooks::call_input))
        .route(
            "/webhooks/voice/status/:call_id",
            post(webhooks::call_status),
        )
        .route(
            "/webhooks/voice/recording/:call_id",
            post(webhooks::call_recording),
        )
        .route("/webhooks/sms/opt-out", post(webhooks::sms_opt_out))
        // Synthesized audio for the provider to fetch
        .route("/media/:id", get(serve_media))
        // Health and metrics
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS from configured origins; permissive only when disabled (dev)
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

#[derive(Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(default)]
    pub script_ref: Option<String>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub daily_call_cap: Option<u32>,
    #[serde(default)]
    pub utc_offset_hours: Option<i8>,
}

async fn create_campaign(
    State(state): State<AppState>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<Json<Campaign>, ServerError> {
    if request.name.trim().is_empty() {
        return Err(Error::Validation("campaign name must not be empty".to_string()).into());
    }

    let mut campaign = Campaign::new(
        request.name.trim(),
        request.script_ref.unwrap_or_else(|| "default".to_string()),
    );
    if let Some(retry) = request.retry_policy {
        if retry.max_attempts == 0 {
            return Err(Error::Validation("max_attempts must be at least 1".to_string()).into());
        }
        campaign.retry_policy = retry;
    }
    campaign.daily_call_cap = request.daily_call_cap.unwrap_or(0);
    campaign.utc_offset_hours = request.utc_offset_hours;

    state.store.campaigns.upsert(&campaign).await?;
    tracing::info!(campaign_id = %campaign.id, name = %campaign.name, "campaign created");
    Ok(Json(campaign))
}

async fn list_campaigns(
    State(state): State<AppState>,
) -> Result<Json<Vec<Campaign>>, ServerError> {
    Ok(Json(state.store.campaigns.list().await?))
}

#[derive(Deserialize, Default)]
pub struct StartCampaignRequest {
    #[serde(default)]
    pub contact_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub calls_per_minute: Option<u32>,
}

async fn start_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    request: Option<Json<StartCampaignRequest>>,
) -> Result<Json<StartSummary>, ServerError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    if request.calls_per_minute == Some(0) {
        return Err(Error::Validation("calls_per_minute must be positive".to_string()).into());
    }

    let summary = state
        .dispatcher
        .start_campaign(campaign_id, request.contact_ids, request.calls_per_minute)
        .await?;
    Ok(Json(summary))
}

#[derive(Serialize)]
pub struct StopSummary {
    pub cancelled: usize,
}

async fn stop_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<StopSummary>, ServerError> {
    let cancelled = state.dispatcher.stop_campaign(campaign_id).await?;
    Ok(Json(StopSummary { cancelled }))
}

#[derive(Serialize)]
pub struct CampaignStats {
    pub total_calls: usize,
    pub completed_calls: usize,
    pub qualified_leads: usize,
    pub conversion_rate: f64,
    pub avg_duration_seconds: u32,
}

async fn campaign_stats(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignStats>, ServerError> {
    if state.store.campaigns.get(campaign_id).await?.is_none() {
        return Err(Error::not_found("campaign", campaign_id.to_string()).into());
    }

    let calls = state.store.calls.list_by_campaign(campaign_id).await?;
    let completed: Vec<_> = calls
        .iter()
        .filter(|c| c.status == dialwave_core::CallStatus::Completed)
        .collect();
    let qualified = state
        .store
        .contacts
        .count_by_status(Some(campaign_id), ContactStatus::Qualified)
        .await?;

    let total_calls = calls.len();
    let conversion_rate = if total_calls > 0 {
        (qualified as f64 / total_calls as f64 * 10_000.0).round() / 100.0
    } else {
        0.0
    };
    let avg_duration_seconds = if completed.is_empty() {
        0
    } else {
        completed.iter().map(|c| c.duration_seconds).sum::<u32>() / completed.len() as u32
    };

    Ok(Json(CampaignStats {
        total_calls,
        completed_calls: completed.len(),
        qualified_leads: qualified,
        conversion_rate,
        avg_duration_seconds,
    }))
}

#[derive(Deserialize)]
pub struct CreateContactRequest {
    pub phone: String,
    pub full_name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<Uuid>,
}

async fn create_contact(
    State(state): State<AppState>,
    Json(request): Json<CreateContactRequest>,
) -> Result<Json<Contact>, ServerError> {
    if request.full_name.trim().is_empty() {
        return Err(Error::Validation("full_name must not be empty".to_string()).into());
    }
    let phone = normalize_phone(&request.phone)?;

    if state.store.contacts.find_by_phone(&phone).await?.is_some() {
        return Err(Error::Validation(format!("contact with phone {phone} already exists")).into());
    }

    let mut contact = Contact::new(phone, request.full_name.trim());
    contact.company = request.company.unwrap_or_default();
    contact.campaign_id = request.campaign_id;
    state.store.contacts.upsert(&contact).await?;
    Ok(Json(contact))
}

#[derive(Serialize)]
pub struct ActiveCallView {
    pub id: Uuid,
    pub contact_name: String,
    pub company: String,
    pub phone: String,
    pub status: String,
    pub state: String,
    pub duration_seconds: u32,
    pub turns: Vec<TranscriptTurn>,
}

#[derive(Serialize)]
pub struct TranscriptTurn {
    pub turn_number: u32,
    pub user_input: String,
    pub bot_response: String,
}

async fn active_calls(
    State(state): State<AppState>,
) -> Result<Json<Vec<ActiveCallView>>, ServerError> {
    let calls = state.store.calls.list_active().await?;
    let mut views = Vec::with_capacity(calls.len());

    for call in calls {
        let contact = state.store.contacts.get(call.contact_id).await?;
        let turns = state.store.turns.list(call.id).await?;
        let current_state = turns
            .last()
            .map(|t| t.state.as_str())
            .unwrap_or("greeting");
        let duration_seconds = match call.started_at {
            Some(started) => (state.clock.now() - started).num_seconds().max(0) as u32,
            None => call.duration_seconds,
        };

        views.push(ActiveCallView {
            id: call.id,
            contact_name: contact
                .as_ref()
                .map(|c| c.full_name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            company: contact.as_ref().map(|c| c.company.clone()).unwrap_or_default(),
            phone: contact.map(|c| c.phone).unwrap_or_default(),
            status: call.status.as_str().to_string(),
            state: current_state.to_string(),
            duration_seconds,
            turns: turns
                .into_iter()
                .map(|t| TranscriptTurn {
                    turn_number: t.turn_number,
                    user_input: t.user_input,
                    bot_response: t.bot_response,
                })
                .collect(),
        });
    }

    Ok(Json(views))
}

async fn serve_media(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.audio.get(id) {
        Some(bytes) => ([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use dialwave_config::{ScriptLibrary, Settings};
    use dialwave_core::{
        Clock, GeneratedReply, Intent, IntentContext, LanguageModel, ManualClock,
        ProviderCallDetails, ReplyRequest, Result as CoreResult, Telephony,
    };
    use dialwave_integrations::NoopCrm;
    use dialwave_persistence::PersistenceLayer;
    use dialwave_telephony::{AudioCache, NoopSpeech};

    struct UnusedModel;

    #[async_trait]
    impl LanguageModel for UnusedModel {
        async fn classify_intent(
            &self,
            _utterance: &str,
            _context: &IntentContext,
        ) -> CoreResult<Intent> {
            Ok(Intent::Unknown)
        }

        async fn generate_reply(&self, _request: &ReplyRequest) -> CoreResult<GeneratedReply> {
            Ok(GeneratedReply {
                text: "reply".to_string(),
                confidence: 0.85,
            })
        }
    }

    struct UnusedTelephony;

    #[async_trait]
    impl Telephony for UnusedTelephony {
        async fn initiate_call(
            &self,
            _contact: &Contact,
            call_id: Uuid,
        ) -> CoreResult<String> {
            Ok(format!("CA-{call_id}"))
        }

        async fn send_message(&self, _phone: &str, _body: &str) -> CoreResult<()> {
            Ok(())
        }

        async fn call_details(&self, _external_ref: &str) -> CoreResult<ProviderCallDetails> {
            Ok(ProviderCallDetails::default())
        }

        async fn recording_url(&self, _recording_ref: &str) -> CoreResult<String> {
            Ok(String::new())
        }
    }

    fn state() -> AppState {
        AppState::assemble(
            Settings::default(),
            PersistenceLayer::in_memory(),
            Arc::new(ScriptLibrary::with_default()),
            Arc::new(UnusedModel),
            Arc::new(UnusedTelephony),
            Arc::new(NoopSpeech),
            Arc::new(NoopCrm),
            Arc::new(ManualClock::new(Utc::now())) as Arc<dyn Clock>,
            Arc::new(AudioCache::new()),
            None,
        )
    }

    #[tokio::test]
    async fn campaign_name_is_validated_before_any_write() {
        let state = state();
        let result = create_campaign(
            State(state.clone()),
            Json(CreateCampaignRequest {
                name: "   ".to_string(),
                script_ref: None,
                retry_policy: None,
                daily_call_cap: None,
                utc_offset_hours: None,
            }),
        )
        .await;

        assert!(result.is_err());
        assert!(state.store.campaigns.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn contact_phone_is_normalized_on_intake() {
        let state = state();
        let Json(contact) = create_contact(
            State(state.clone()),
            Json(CreateContactRequest {
                phone: "(913) 555-0142".to_string(),
                full_name: "Dana Reeve".to_string(),
                company: Some("Reeve Commercial".to_string()),
                campaign_id: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(contact.phone, "+19135550142");

        // A second intake of the same number is rejected
        let duplicate = create_contact(
            State(state),
            Json(CreateContactRequest {
                phone: "913-555-0142".to_string(),
                full_name: "Dana R".to_string(),
                company: None,
                campaign_id: None,
            }),
        )
        .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn start_rejects_zero_rate() {
        let state = state();
        let Json(campaign) = create_campaign(
            State(state.clone()),
            Json(CreateCampaignRequest {
                name: "Spring brokers".to_string(),
                script_ref: None,
                retry_policy: None,
                daily_call_cap: None,
                utc_offset_hours: None,
            }),
        )
        .await
        .unwrap();

        let result = start_campaign(
            State(state),
            Path(campaign.id),
            Some(Json(StartCampaignRequest {
                contact_ids: None,
                calls_per_minute: Some(0),
            })),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stats_for_unknown_campaign_is_not_found() {
        let state = state();
        let result = campaign_stats(State(state), Path(Uuid::new_v4())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_campaign_start_queues_nothing() {
        let state = state();
        let Json(campaign) = create_campaign(
            State(state.clone()),
            Json(CreateCampaignRequest {
                name: "Empty".to_string(),
                script_ref: None,
                retry_policy: None,
                daily_call_cap: None,
                utc_offset_hours: None,
            }),
        )
        .await
        .unwrap();

        let Json(summary) = start_campaign(State(state), Path(campaign.id), None)
            .await
            .unwrap();
        assert_eq!(summary.queued, 0);
        assert_eq!(summary.estimated_duration_ms, 0);
    }
}
