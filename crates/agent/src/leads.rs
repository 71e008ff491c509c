use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Qualification handed over to the sales team once the assistant closes a lead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadQualification {
    #[serde(rename = "classificacao")]
    pub classification: String,
    #[serde(rename = "resumo")]
    pub summary: String,
}

#[derive(Debug, Error)]
pub enum LeadNotifyError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook answered with status {0}")]
    Status(u16),
}

#[async_trait]
pub trait LeadNotifier: Send + Sync {
    async fn notify(&self, lead: &LeadQualification) -> Result<(), LeadNotifyError>;
}

/// Posts qualified leads as JSON to an automation webhook.
///
/// No request timeout and no retry: the webhook either accepts the lead or the
/// tool reports the failure to the assistant.
#[derive(Clone, Debug)]
pub struct WebhookLeadNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookLeadNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl LeadNotifier for WebhookLeadNotifier {
    async fn notify(&self, lead: &LeadQualification) -> Result<(), LeadNotifyError> {
        let response = self.client.post(&self.url).json(lead).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LeadNotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}
