//! Sales script library
//!
//! A script bundles the persona guidelines, per-state objectives, and the
//! scripted lines (voicemail, apology, opt-out) plus SMS templates used by
//! the engine and the webhook layer. Campaigns reference scripts by name;
//! an unknown reference resolves to the built-in default.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use dialwave_core::ConversationState;

use crate::ConfigError;

pub const DEFAULT_SCRIPT_NAME: &str = "default";

/// One sales script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesScript {
    pub name: String,
    /// Persona and conversational guidelines given to the reply generator
    pub persona: String,
    pub company_name: String,
    /// Voice profile name for speech synthesis
    #[serde(default)]
    pub voice_profile: String,
    /// Per-state objectives, keyed by state name; missing states use the
    /// generic fallback
    #[serde(default)]
    pub objectives: HashMap<String, String>,
    pub voicemail_message: String,
    /// Spoken when a mid-call failure forces a scripted termination
    pub apology_line: String,
    /// Appended before hangup on a graceful end
    pub closing_line: String,
    pub opt_out_line: String,
    /// SMS sent with the booking link on qualification; supports {name} and
    /// {company} placeholders
    pub booking_sms: String,
    /// SMS sent on nurture; same placeholders
    pub nurture_sms: String,
    pub opt_out_confirmation_sms: String,
}

impl SalesScript {
    /// Objective for a state, falling back to the generic one
    pub fn objective(&self, state: ConversationState) -> String {
        self.objectives
            .get(state.as_str())
            .cloned()
            .unwrap_or_else(|| state.fallback_objective().to_string())
    }

    /// Fill {name} and {company} placeholders in an SMS template
    pub fn render_sms(template: &str, name: &str, company: &str) -> String {
        template.replace("{name}", name).replace("{company}", company)
    }

    /// Built-in script for the drone media outbound campaign
    pub fn builtin_default() -> Self {
        let mut objectives = HashMap::new();
        objectives.insert(
            "greeting".to_string(),
            "Introduce yourself and confirm you're speaking with the right person. \
             Mention a brief value prop."
                .to_string(),
        );
        objectives.insert(
            "value_pitch".to_string(),
            "Explain how drone media helps properties lease 30% faster with aerial \
             views and traffic overlays."
                .to_string(),
        );
        objectives.insert(
            "qualify".to_string(),
            "Ask about their current listings, timeline for media needs, and typical \
             marketing budget."
                .to_string(),
        );
        objectives.insert(
            "objection_handling".to_string(),
            "Address their concern empathetically and pivot to value or an \
             alternative solution."
                .to_string(),
        );
        objectives.insert(
            "close".to_string(),
            "Offer two specific meeting times or send a booking link.".to_string(),
        );
        objectives.insert(
            "end".to_string(),
            "Thank them and provide opt-out instructions.".to_string(),
        );

        Self {
            name: DEFAULT_SCRIPT_NAME.to_string(),
            persona: "You are a professional sales development representative for a \
                      drone photography and videography service targeting commercial \
                      real estate brokers.\n\
                      Guidelines:\n\
                      - Keep responses under 2 sentences\n\
                      - Sound natural and conversational\n\
                      - Focus on value and ROI\n\
                      - Ask one question at a time\n\
                      - Be respectful of their time"
                .to_string(),
            company_name: "Skyline Media".to_string(),
            voice_profile: "rachel".to_string(),
            objectives,
            voicemail_message: "Hello, this is Skyline Media. We specialize in drone \
                                photography for commercial real estate. Please call us \
                                back to learn how we can help your properties lease \
                                faster. Thank you!"
                .to_string(),
            apology_line: "I apologize, but I'm having technical difficulties. Please \
                           call us back at your convenience. Thank you!"
                .to_string(),
            closing_line: "Have a great day!".to_string(),
            opt_out_line: "If you'd prefer not to hear from us again, just reply STOP \
                           to our follow-up message."
                .to_string(),
            booking_sms: "Hi {name}! Great talking with you about drone media for \
                          {company}. Here's my calendar to book a 15-minute strategy \
                          call: https://cal.skyline.media/intro"
                .to_string(),
            nurture_sms: "Hi {name}, thanks for your time today! I'm sending you our \
                          portfolio showcasing recent drone projects. Would love to \
                          reconnect when you're ready: https://skyline.media/portfolio"
                .to_string(),
            opt_out_confirmation_sms: "You have been removed from our list. Reply \
                                       START to resubscribe."
                .to_string(),
        }
    }
}

/// Named script collection with a guaranteed default
#[derive(Debug, Clone)]
pub struct ScriptLibrary {
    scripts: HashMap<String, SalesScript>,
}

impl ScriptLibrary {
    /// Library containing only the built-in default
    pub fn with_default() -> Self {
        let mut scripts = HashMap::new();
        scripts.insert(
            DEFAULT_SCRIPT_NAME.to_string(),
            SalesScript::builtin_default(),
        );
        Self { scripts }
    }

    /// Load every `*.yaml` script in a directory on top of the default
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut library = Self::with_default();
        let dir = dir.as_ref();

        if !dir.exists() {
            tracing::debug!(dir = %dir.display(), "scripts directory missing, using built-in default");
            return Ok(library);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let raw = fs::read_to_string(&path)?;
            let script: SalesScript = serde_yaml::from_str(&raw)?;
            if script.name.is_empty() {
                return Err(ConfigError::Script(format!(
                    "script at {} has an empty name",
                    path.display()
                )));
            }
            tracing::info!(script = %script.name, path = %path.display(), "loaded sales script");
            library.scripts.insert(script.name.clone(), script);
        }

        Ok(library)
    }

    /// Resolve a campaign's script reference, falling back to the default
    pub fn resolve(&self, script_ref: &str) -> &SalesScript {
        self.scripts.get(script_ref).unwrap_or_else(|| {
            // with_default guarantees the entry exists
            &self.scripts[DEFAULT_SCRIPT_NAME]
        })
    }

    pub fn default_script(&self) -> &SalesScript {
        self.resolve(DEFAULT_SCRIPT_NAME)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
