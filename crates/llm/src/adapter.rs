//! Adapter implementing the core `LanguageModel` trait
//!
//! Classification parses the model's output against the fixed label set and
//! degrades to `unknown` on anything unparseable; only transport failures
//! propagate. Reply generation propagates all failures so the webhook
//! boundary can terminate the call with the scripted apology.

use std::sync::Arc;

use async_trait::async_trait;

use dialwave_core::{
    GeneratedReply, Intent, IntentContext, LanguageModel, ReplyRequest, Result,
};

use crate::backend::{LlmBackend, LlmRequest};
use crate::prompt::Message;

/// Confidence attached to generated replies; the API does not expose one
const REPLY_CONFIDENCE: f32 = 0.85;

/// Model selection and generation parameters for the adapter
#[derive(Debug, Clone)]
pub struct DialogueModelConfig {
    pub classify_model: String,
    pub reply_model: String,
    pub reply_max_tokens: usize,
    pub temperature: f32,
}

impl DialogueModelConfig {
    pub fn from_settings(settings: &dialwave_config::LlmSettings) -> Self {
        Self {
            classify_model: settings.classify_model.clone(),
            reply_model: settings.reply_model.clone(),
            reply_max_tokens: settings.reply_max_tokens,
            temperature: settings.temperature,
        }
    }
}

/// `LanguageModel` implementation over an [`LlmBackend`]
pub struct DialogueModel {
    backend: Arc<dyn LlmBackend>,
    config: DialogueModelConfig,
}

impl DialogueModel {
    pub fn new(backend: Arc<dyn LlmBackend>, config: DialogueModelConfig) -> Self {
        Self { backend, config }
    }

    fn classification_prompt(utterance: &str, context: &IntentContext) -> String {
        let labels = Intent::labels()
            .iter()
            .map(|l| format!("- {l}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Analyze this response in a sales call context.\n\
             Current state: {}\n\
             User said: \"{}\"\n\n\
             Classify the intent as one of:\n{}\n\n\
             Return only the intent label.",
            context.state, utterance, labels
        )
    }

    fn reply_system_prompt(request: &ReplyRequest) -> String {
        format!(
            "{}\n\nCurrent call state: {}\nContact: {} at {}",
            request.persona, request.state, request.contact_name, request.company
        )
    }

    fn reply_user_prompt(request: &ReplyRequest) -> String {
        let mut prompt = String::new();
        if !request.history.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for turn in &request.history {
                if !turn.user_input.is_empty() {
                    prompt.push_str(&format!("Caller: {}\n", turn.user_input));
                }
                prompt.push_str(&format!("You: {}\n", turn.bot_response));
            }
            prompt.push('\n');
        }
        if request.user_input.is_empty() {
            prompt.push_str("The caller just picked up; open the conversation.\n\n");
        } else {
            prompt.push_str(&format!("Caller said: \"{}\"\n\n", request.user_input));
        }
        prompt.push_str(&format!(
            "Generate a response for the {} state.\nObjective: {}",
            request.state, request.objective
        ));
        prompt
    }
}

#[async_trait]
impl LanguageModel for DialogueModel {
    async fn classify_intent(&self, utterance: &str, context: &IntentContext) -> Result<Intent> {
        let request = LlmRequest {
            model: self.config.classify_model.clone(),
            system: None,
            messages: vec![Message::user(Self::classification_prompt(
                utterance, context,
            ))],
            max_tokens: 16,
            temperature: 0.0,
        };

        let response = self.backend.generate(&request).await?;
        let intent = Intent::parse(&response.text);
        if intent == Intent::Unknown && !response.text.trim().is_empty() {
            tracing::debug!(raw = %response.text.trim(), "unparseable intent label, degrading to unknown");
        }
        Ok(intent)
    }

    async fn generate_reply(&self, request: &ReplyRequest) -> Result<GeneratedReply> {
        let llm_request = LlmRequest {
            model: self.config.reply_model.clone(),
            system: Some(Self::reply_system_prompt(request)),
            messages: vec![Message::user(Self::reply_user_prompt(request))],
            max_tokens: self.config.reply_max_tokens,
            temperature: self.config.temperature,
        };

        let response = self.backend.generate(&llm_request).await?;
        let text = response.text.trim().to_string();
        if text.is_empty() {
            return Err(dialwave_core::Error::Provider(
                "reply generation returned empty text".to_string(),
            ));
        }

        Ok(GeneratedReply {
            text,
            confidence: REPLY_CONFIDENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LlmResponse;
    use crate::LlmError;
    use dialwave_core::ConversationState;
    use std::sync::Mutex;

    type FakeReply = std::result::Result<String, String>;

    struct FakeBackend {
        replies: Mutex<Vec<FakeReply>>,
    }

    impl FakeBackend {
        fn returning(texts: Vec<FakeReply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(texts),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for FakeBackend {
        async fn generate(
            &self,
            _request: &LlmRequest,
        ) -> std::result::Result<LlmResponse, LlmError> {
            let next = self.replies.lock().unwrap().remove(0);
            match next {
                Ok(text) => Ok(LlmResponse {
                    text,
                    input_tokens: 0,
                    output_tokens: 0,
                }),
                Err(e) => Err(LlmError::Api(e)),
            }
        }
    }

    fn config() -> DialogueModelConfig {
        DialogueModelConfig {
            classify_model: "classify".to_string(),
            reply_model: "reply".to_string(),
            reply_max_tokens: 150,
            temperature: 0.7,
        }
    }

    fn context() -> IntentContext {
        IntentContext {
            state: ConversationState::Greeting,
            turn_count: 1,
        }
    }

    #[tokio::test]
    async fn parses_clean_label() {
        let backend = FakeBackend::returning(vec![Ok("schedule".to_string())]);
        let model = DialogueModel::new(backend, config());
        let intent = model.classify_intent("let's set a time", &context()).await.unwrap();
        assert_eq!(intent, Intent::Schedule);
    }

    #[tokio::test]
    async fn malformed_label_degrades_to_unknown() {
        let backend =
            FakeBackend::returning(vec![Ok("The caller seems interested.".to_string())]);
        let model = DialogueModel::new(backend, config());
        let intent = model.classify_intent("hmm", &context()).await.unwrap();
        assert_eq!(intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let backend = FakeBackend::returning(vec![Err("boom".to_string())]);
        let model = DialogueModel::new(backend, config());
        assert!(model.classify_intent("hi", &context()).await.is_err());
    }

    #[tokio::test]
    async fn generation_error_propagates() {
        let backend = FakeBackend::returning(vec![Err("overloaded".to_string())]);
        let model = DialogueModel::new(backend, config());
        let request = ReplyRequest {
            state: ConversationState::ValuePitch,
            objective: "pitch".to_string(),
            persona: "persona".to_string(),
            contact_name: "Dana".to_string(),
            company: "Acme Realty".to_string(),
            history: Vec::new(),
            user_input: "tell me more".to_string(),
        };
        assert!(model.generate_reply(&request).await.is_err());
    }

    #[tokio::test]
    async fn empty_generation_is_an_error() {
        let backend = FakeBackend::returning(vec![Ok("   ".to_string())]);
        let model = DialogueModel::new(backend, config());
        let request = ReplyRequest {
            state: ConversationState::Close,
            objective: "close".to_string(),
            persona: "persona".to_string(),
            contact_name: "Dana".to_string(),
            company: "Acme Realty".to_string(),
            history: Vec::new(),
            user_input: "ok".to_string(),
        };
        assert!(model.generate_reply(&request).await.is_err());
    }
}
