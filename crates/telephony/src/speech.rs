//! Speech synthesis collaborator
//!
//! Synthesized audio is cached in memory and exposed through a media URL the
//! voice provider can fetch. Any synthesis failure returns `None`, which
//! callers treat as "use the provider's basic fallback voice".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

use dialwave_config::SpeechSettings;
use dialwave_core::{Result, SpeechSynthesis};

/// In-memory store for synthesized audio, served at `/media/:id`
#[derive(Default)]
pub struct AudioCache {
    clips: DashMap<Uuid, Vec<u8>>,
}

impl AudioCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bytes: Vec<u8>) -> Uuid {
        let id = Uuid::new_v4();
        self.clips.insert(id, bytes);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<Vec<u8>> {
        self.clips.get(&id).map(|c| c.clone())
    }

    /// Drop a clip after the provider has fetched it
    pub fn remove(&self, id: Uuid) {
        self.clips.remove(&id);
    }
}

/// HTTP speech synthesis client
pub struct HttpSpeechClient {
    endpoint: String,
    api_key: String,
    media_base_url: String,
    cache: Arc<AudioCache>,
    client: Client,
}

impl HttpSpeechClient {
    pub fn new(
        settings: &SpeechSettings,
        media_base_url: impl Into<String>,
        cache: Arc<AudioCache>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            media_base_url: media_base_url.into(),
            cache,
            client,
        }
    }
}

#[async_trait]
impl SpeechSynthesis for HttpSpeechClient {
    async fn synthesize(&self, text: &str, voice_profile: &str) -> Result<Option<String>> {
        if self.api_key.is_empty() {
            return Ok(None);
        }

        let url = format!("{}/text-to-speech/{}", self.endpoint, voice_profile);
        let body = json!({
            "text": text,
            "model_id": "eleven_monolingual_v1",
            "voice_settings": { "stability": 0.5, "similarity_boost": 0.75 }
        });

        let response = match self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis request failed, using fallback voice");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                status = %response.status(),
                "speech synthesis rejected, using fallback voice"
            );
            return Ok(None);
        }

        match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => {
                let id = self.cache.put(bytes.to_vec());
                Ok(Some(format!("{}/media/{}", self.media_base_url, id)))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read synthesized audio, using fallback voice");
                Ok(None)
            }
        }
    }
}

/// Synthesis stub used when speech is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpeech;

#[async_trait]
impl SpeechSynthesis for NoopSpeech {
    async fn synthesize(&self, _text: &str, _voice_profile: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_always_signals_fallback() {
        let speech = NoopSpeech;
        assert!(speech.synthesize("hello", "rachel").await.unwrap().is_none());
    }

    #[test]
    fn audio_cache_round_trip() {
        let cache = AudioCache::new();
        let id = cache.put(vec![1, 2, 3]);
        assert_eq!(cache.get(id), Some(vec![1, 2, 3]));
        cache.remove(id);
        assert_eq!(cache.get(id), None);
    }
}
