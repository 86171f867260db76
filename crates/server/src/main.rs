//! Server entry point
//!
//! Loads configuration, wires every collaborator once, and serves the
//! router. Persistence degrades to in-memory stores when ScyllaDB is
//! unreachable; LLM and telephony credentials are required.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use dialwave_config::{load_settings, ScriptLibrary, Settings};
use dialwave_core::{SpeechSynthesis, SystemClock};
use dialwave_integrations::{CrmConnector, HttpCrmConnector, NoopCrm};
use dialwave_llm::adapter::DialogueModelConfig;
use dialwave_llm::{AnthropicBackend, AnthropicConfig, DialogueModel};
use dialwave_persistence::{PersistenceLayer, ScyllaConfig};
use dialwave_server::{create_router, init_metrics, AppState};
use dialwave_telephony::{AudioCache, HttpSpeechClient, NoopSpeech, VoiceClient, VoiceClientConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("DIALWAVE_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: failed to load config: {e}. Using defaults.");
            Settings::default()
        }
    };

    init_tracing(&config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "Starting dialwave server"
    );

    let metrics = if config.observability.metrics_enabled {
        init_metrics()
    } else {
        None
    };

    let scripts = Arc::new(ScriptLibrary::load_dir(&config.scripts_dir)?);
    tracing::info!(scripts = scripts.len(), "script library loaded");

    let store = if config.persistence.enabled {
        let scylla_config = ScyllaConfig {
            hosts: config.persistence.scylla_hosts.clone(),
            keyspace: config.persistence.keyspace.clone(),
            replication_factor: config.persistence.replication_factor,
        };
        match PersistenceLayer::scylla(scylla_config).await {
            Ok(layer) => {
                tracing::info!(
                    hosts = ?config.persistence.scylla_hosts,
                    keyspace = %config.persistence.keyspace,
                    "ScyllaDB persistence initialized"
                );
                layer
            }
            Err(e) => {
                tracing::error!(error = %e, "ScyllaDB unavailable, falling back to in-memory stores");
                PersistenceLayer::in_memory()
            }
        }
    } else {
        tracing::info!("persistence disabled, using in-memory stores");
        PersistenceLayer::in_memory()
    };

    let backend = Arc::new(AnthropicBackend::new(AnthropicConfig::from_settings(
        &config.llm,
    ))?);
    let model = Arc::new(DialogueModel::new(
        backend,
        DialogueModelConfig::from_settings(&config.llm),
    ));

    let telephony = Arc::new(VoiceClient::new(VoiceClientConfig::from_settings(
        &config.telephony,
    ))?);

    let audio = Arc::new(AudioCache::new());
    let speech: Arc<dyn SpeechSynthesis> = if config.speech.enabled {
        Arc::new(HttpSpeechClient::new(
            &config.speech,
            config.telephony.webhook_base_url.clone(),
            audio.clone(),
        ))
    } else {
        Arc::new(NoopSpeech)
    };

    let crm: Arc<dyn CrmConnector> = if config.crm.provider == "http" {
        Arc::new(HttpCrmConnector::new(&config.crm)?)
    } else {
        tracing::info!("CRM provider set to noop");
        Arc::new(NoopCrm)
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::assemble(
        config,
        store,
        scripts,
        model,
        telephony,
        speech,
        crm,
        Arc::new(SystemClock),
        audio,
        metrics,
    );
    let router = create_router(state);

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing(config: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_filter));

    if config.observability.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
