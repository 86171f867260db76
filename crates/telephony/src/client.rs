//! Voice provider HTTP client
//!
//! Places outbound calls, fetches post-call details and recordings, and
//! sends SMS through the provider's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use dialwave_config::TelephonySettings;
use dialwave_core::{Contact, ProviderCallDetails, Result, Telephony};

use crate::TelephonyError;

/// Configuration for the voice provider client
#[derive(Debug, Clone)]
pub struct VoiceClientConfig {
    pub endpoint: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub webhook_base_url: String,
    pub timeout: Duration,
}

impl VoiceClientConfig {
    pub fn from_settings(settings: &TelephonySettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from_number: settings.from_number.clone(),
            webhook_base_url: settings.webhook_base_url.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

#[derive(Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Deserialize)]
struct CallDetailResource {
    status: String,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    answered_by: Option<String>,
}

#[derive(Deserialize)]
struct RecordingResource {
    uri: String,
}

/// REST client for the voice provider
pub struct VoiceClient {
    config: VoiceClientConfig,
    client: Client,
}

impl VoiceClient {
    pub fn new(config: VoiceClientConfig) -> std::result::Result<Self, TelephonyError> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(TelephonyError::Configuration(
                "telephony account_sid/auth_token not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TelephonyError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn account_url(&self, resource: &str) -> String {
        format!(
            "{}/Accounts/{}/{}",
            self.config.endpoint, self.config.account_sid, resource
        )
    }

    async fn check(response: reqwest::Response) -> std::result::Result<reqwest::Response, TelephonyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TelephonyError::Api(format!("HTTP {status}: {body}")))
    }
}

#[async_trait]
impl Telephony for VoiceClient {
    async fn initiate_call(&self, contact: &Contact, call_id: Uuid) -> Result<String> {
        let base = &self.config.webhook_base_url;
        let params = [
            ("To", contact.phone.clone()),
            ("From", self.config.from_number.clone()),
            ("Url", format!("{base}/webhooks/voice/answered/{call_id}")),
            (
                "StatusCallback",
                format!("{base}/webhooks/voice/status/{call_id}"),
            ),
            (
                "StatusCallbackEvent",
                "initiated ringing answered completed".to_string(),
            ),
            ("Record", "true".to_string()),
            (
                "RecordingStatusCallback",
                format!("{base}/webhooks/voice/recording/{call_id}"),
            ),
            ("MachineDetection", "DetectMessageEnd".to_string()),
            ("MachineDetectionTimeout", "3000".to_string()),
        ];

        let response = self
            .client
            .post(self.account_url("Calls.json"))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(TelephonyError::from)?;
        let response = Self::check(response).await?;

        let resource: CallResource = response
            .json()
            .await
            .map_err(|e| TelephonyError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            call_id = %call_id,
            external_ref = %resource.sid,
            phone = %contact.phone,
            "Call initiated"
        );
        Ok(resource.sid)
    }

    async fn send_message(&self, phone: &str, body: &str) -> Result<()> {
        let params = [
            ("To", phone.to_string()),
            ("From", self.config.from_number.clone()),
            ("Body", body.to_string()),
        ];

        let response = self
            .client
            .post(self.account_url("Messages.json"))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(TelephonyError::from)?;
        Self::check(response).await?;

        tracing::info!(phone = %phone, "SMS sent");
        Ok(())
    }

    async fn call_details(&self, external_ref: &str) -> Result<ProviderCallDetails> {
        let response = self
            .client
            .get(self.account_url(&format!("Calls/{external_ref}.json")))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await
            .map_err(TelephonyError::from)?;
        let response = Self::check(response).await?;

        let resource: CallDetailResource = response
            .json()
            .await
            .map_err(|e| TelephonyError::InvalidResponse(e.to_string()))?;

        Ok(ProviderCallDetails {
            duration_seconds: resource
                .duration
                .as_deref()
                .and_then(|d| d.parse().ok())
                .unwrap_or(0),
            status: resource.status,
            price: resource.price.as_deref().and_then(|p| p.parse().ok()),
            answered_by: resource.answered_by,
        })
    }

    async fn recording_url(&self, recording_ref: &str) -> Result<String> {
        let response = self
            .client
            .get(self.account_url(&format!("Recordings/{recording_ref}.json")))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await
            .map_err(TelephonyError::from)?;
        let response = Self::check(response).await?;

        let resource: RecordingResource = response
            .json()
            .await
            .map_err(|e| TelephonyError::InvalidResponse(e.to_string()))?;

        Ok(format!(
            "{}{}",
            self.config.endpoint.trim_end_matches("/2010-04-01"),
            resource.uri.replace(".json", ".mp3")
        ))
    }
}

/// Telephony cost for a completed call, rounded up to whole minutes
pub fn calculate_call_cost(duration_seconds: u32, price_per_minute: f64) -> f64 {
    let minutes = duration_seconds.div_ceil(60);
    minutes as f64 * price_per_minute
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_rounds_up_to_whole_minutes() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert_eq!(calculate_call_cost(0, 0.0085), 0.0);
        assert!(close(calculate_call_cost(59, 0.0085), 0.0085));
        assert!(close(calculate_call_cost(60, 0.0085), 0.0085));
        assert!(close(calculate_call_cost(61, 0.0085), 0.017));
        assert!(close(calculate_call_cost(600, 0.0085), 0.085));
    }

    #[test]
    fn client_requires_credentials() {
        let config = VoiceClientConfig {
            endpoint: "https://api.twilio.com/2010-04-01".to_string(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: "+15550001111".to_string(),
            webhook_base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(VoiceClient::new(config).is_err());
    }
}
