//! Application state
//!
//! All collaborators are constructed once at startup and injected here; no
//! component reaches for globals.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;

use dialwave_config::{ScriptLibrary, Settings};
use dialwave_core::{Clock, LanguageModel, SpeechSynthesis, Telephony};
use dialwave_dialogue::{ConversationStateEngine, LeadQualificationEvaluator};
use dialwave_dispatch::{
    CallJobHandler, CallingWindow, CampaignDispatcher, ComplianceGate, JobQueue,
};
use dialwave_integrations::CrmConnector;
use dialwave_persistence::PersistenceLayer;
use dialwave_telephony::AudioCache;

/// Shared state across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: PersistenceLayer,
    pub scripts: Arc<ScriptLibrary>,
    pub engine: Arc<ConversationStateEngine>,
    pub evaluator: Arc<LeadQualificationEvaluator>,
    pub dispatcher: Arc<CampaignDispatcher>,
    pub gate: Arc<ComplianceGate>,
    pub telephony: Arc<dyn Telephony>,
    pub speech: Arc<dyn SpeechSynthesis>,
    pub audio: Arc<AudioCache>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire every component from its collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        config: Settings,
        store: PersistenceLayer,
        scripts: Arc<ScriptLibrary>,
        model: Arc<dyn LanguageModel>,
        telephony: Arc<dyn Telephony>,
        speech: Arc<dyn SpeechSynthesis>,
        crm: Arc<dyn CrmConnector>,
        clock: Arc<dyn Clock>,
        audio: Arc<AudioCache>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let dispatch = &config.dispatch;

        let gate = Arc::new(ComplianceGate::new(
            store.contacts.clone(),
            store.dnc.clone(),
            store.calls.clone(),
            clock.clone(),
            CallingWindow::new(dispatch.calling_hour_start, dispatch.calling_hour_end),
            dispatch.lookback_hours,
        ));

        let handler = Arc::new(CallJobHandler::new(
            store.campaigns.clone(),
            store.contacts.clone(),
            store.calls.clone(),
            gate.clone(),
            telephony.clone(),
            clock.clone(),
            Duration::from_secs(dispatch.reschedule_delay_minutes as u64 * 60),
        ));
        let queue = JobQueue::new(handler);

        let dispatcher = Arc::new(CampaignDispatcher::new(
            store.campaigns.clone(),
            store.contacts.clone(),
            queue,
            dispatch.batch_cap,
            dispatch.default_calls_per_minute,
        ));

        let engine = Arc::new(ConversationStateEngine::new(
            store.calls.clone(),
            store.contacts.clone(),
            store.campaigns.clone(),
            store.turns.clone(),
            model,
            scripts.clone(),
            clock.clone(),
        ));

        let evaluator = Arc::new(LeadQualificationEvaluator::new(
            store.contacts.clone(),
            store.qualifications.clone(),
            crm,
            telephony.clone(),
            scripts.clone(),
            config.crm.nurture_sequence_id.clone(),
            clock.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            scripts,
            engine,
            evaluator,
            dispatcher,
            gate,
            telephony,
            speech,
            audio,
            clock,
            metrics,
        }
    }
}
