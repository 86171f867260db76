//! CRM connector
//!
//! Pushes qualified leads into the CRM: contact upsert, deal creation, and
//! nurture-sequence enrollment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;

use dialwave_config::CrmSettings;

use crate::IntegrationError;

/// Contact payload for the CRM
#[derive(Debug, Clone, Serialize)]
pub struct CrmContact {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub company: String,
    /// Extra properties (lead score, timeline, budget band, source)
    pub properties: serde_json::Value,
}

impl CrmContact {
    /// Split a full name into first/last on the first space
    pub fn split_name(full_name: &str) -> (String, String) {
        match full_name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (full_name.to_string(), String::new()),
        }
    }

    /// Placeholder email for phone-only contacts
    pub fn placeholder_email(phone: &str) -> String {
        format!("{}@placeholder.invalid", phone.trim_start_matches('+'))
    }
}

/// Deal payload for the CRM
#[derive(Debug, Clone, Serialize)]
pub struct CrmDeal {
    pub name: String,
    pub pipeline: String,
    pub stage: String,
    pub amount: f64,
    pub contact_email: String,
}

/// CRM boundary; all operations are best-effort
#[async_trait]
pub trait CrmConnector: Send + Sync {
    async fn upsert_contact(&self, contact: &CrmContact) -> Result<(), IntegrationError>;

    async fn create_deal(&self, deal: &CrmDeal) -> Result<(), IntegrationError>;

    async fn enroll_in_sequence(
        &self,
        email: &str,
        sequence_id: &str,
    ) -> Result<(), IntegrationError>;
}

/// HTTP CRM connector
pub struct HttpCrmConnector {
    endpoint: String,
    access_token: String,
    client: Client,
}

impl HttpCrmConnector {
    pub fn new(settings: &CrmSettings) -> Result<Self, IntegrationError> {
        if settings.endpoint.is_empty() || settings.access_token.is_empty() {
            return Err(IntegrationError::InvalidRequest(
                "crm endpoint/access_token not configured".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| IntegrationError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            access_token: settings.access_token.clone(),
            client,
        })
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), IntegrationError> {
        let response = self
            .client
            .post(format!("{}{}", self.endpoint, path))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(IntegrationError::AuthFailed(text)),
            429 => Err(IntegrationError::RateLimited),
            400..=499 => Err(IntegrationError::InvalidRequest(text)),
            _ => Err(IntegrationError::Internal(format!("HTTP {status}: {text}"))),
        }
    }
}

#[async_trait]
impl CrmConnector for HttpCrmConnector {
    async fn upsert_contact(&self, contact: &CrmContact) -> Result<(), IntegrationError> {
        self.post(
            "/crm/v3/objects/contacts",
            json!({
                "properties": {
                    "email": contact.email,
                    "firstname": contact.first_name,
                    "lastname": contact.last_name,
                    "phone": contact.phone,
                    "company": contact.company,
                },
                "extra": contact.properties,
            }),
        )
        .await?;
        tracing::info!(email = %contact.email, "CRM contact upserted");
        Ok(())
    }

    async fn create_deal(&self, deal: &CrmDeal) -> Result<(), IntegrationError> {
        self.post(
            "/crm/v3/objects/deals",
            json!({
                "properties": {
                    "dealname": deal.name,
                    "pipeline": deal.pipeline,
                    "dealstage": deal.stage,
                    "amount": deal.amount,
                },
                "contact_email": deal.contact_email,
            }),
        )
        .await?;
        tracing::info!(deal = %deal.name, "CRM deal created");
        Ok(())
    }

    async fn enroll_in_sequence(
        &self,
        email: &str,
        sequence_id: &str,
    ) -> Result<(), IntegrationError> {
        self.post(
            &format!("/automation/v2/sequences/{sequence_id}/enrollments"),
            json!({ "email": email }),
        )
        .await?;
        tracing::info!(email = %email, sequence = %sequence_id, "enrolled in nurture sequence");
        Ok(())
    }
}

/// Logging stub used when no CRM is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCrm;

#[async_trait]
impl CrmConnector for NoopCrm {
    async fn upsert_contact(&self, contact: &CrmContact) -> Result<(), IntegrationError> {
        tracing::info!(email = %contact.email, "CRM disabled, contact upsert skipped");
        Ok(())
    }

    async fn create_deal(&self, deal: &CrmDeal) -> Result<(), IntegrationError> {
        tracing::info!(deal = %deal.name, "CRM disabled, deal creation skipped");
        Ok(())
    }

    async fn enroll_in_sequence(
        &self,
        email: &str,
        sequence_id: &str,
    ) -> Result<(), IntegrationError> {
        tracing::info!(email = %email, sequence = %sequence_id, "CRM disabled, enrollment skipped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_full_names() {
        assert_eq!(
            CrmContact::split_name("Dana Reeve"),
            ("Dana".to_string(), "Reeve".to_string())
        );
        assert_eq!(
            CrmContact::split_name("Cher"),
            ("Cher".to_string(), String::new())
        );
        assert_eq!(
            CrmContact::split_name("Mary Jo van der Berg"),
            ("Mary".to_string(), "Jo van der Berg".to_string())
        );
    }

    #[test]
    fn placeholder_email_strips_plus() {
        assert_eq!(
            CrmContact::placeholder_email("+19135550142"),
            "19135550142@placeholder.invalid"
        );
    }

    #[test]
    fn connector_requires_configuration() {
        let settings = CrmSettings::default();
        assert!(HttpCrmConnector::new(&settings).is_err());
    }
}
