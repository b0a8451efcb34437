use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::error::CollaboratorError;
use super::http::{build_client, expect_success, join_url};
use super::prompt;
use super::{Classification, IncidentClassifier, ThreatAssessment, ThreatAssessor};
use crate::config::LlmSettings;
use crate::workflow::state::RiskLevel;

const SERVICE: &str = "llm";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

/// Text-completion client for the Anthropic Messages API, used for both
/// incident classification and threat assessment.
#[derive(Debug, Clone)]
pub struct LlmAnalyst {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl LlmAnalyst {
    pub fn new(
        settings: &LlmSettings,
        verify_ssl: bool,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        debug!(base_url = %settings.base_url, model = %settings.model, "Creating LLM analyst");
        Ok(Self {
            client: build_client(SERVICE, verify_ssl, timeout)?,
            endpoint: join_url(&settings.base_url, "/v1/messages"),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        })
    }

    /// Sends a single user turn and returns the concatenated text blocks.
    pub async fn complete(&self, prompt: String) -> Result<String, CollaboratorError> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(0.1),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;
        let response = expect_success(SERVICE, response).await?;

        let body: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::MalformedResponse {
                    service: SERVICE,
                    reason: e.to_string(),
                })?;

        let text: Vec<&str> = body
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(CollaboratorError::MalformedResponse {
                service: SERVICE,
                reason: format!("message {} has no text content", body.id),
            });
        }
        debug!(message_id = %body.id, stop_reason = ?body.stop_reason, "LLM completion received");
        Ok(text.join("\n"))
    }
}

#[async_trait]
impl IncidentClassifier for LlmAnalyst {
    async fn classify(&self, incident: &str) -> Result<Classification, CollaboratorError> {
        info!("Requesting incident classification from the model");
        let reply = self.complete(prompt::classification_prompt(incident)).await?;
        prompt::parse_classification(&reply)
    }
}

#[async_trait]
impl ThreatAssessor for LlmAnalyst {
    async fn assess(
        &self,
        incident: &str,
        severity: Option<RiskLevel>,
        findings: Option<&str>,
    ) -> Result<ThreatAssessment, CollaboratorError> {
        info!("Requesting threat assessment from the model");
        let reply = self
            .complete(prompt::assessment_prompt(incident, severity, findings))
            .await?;
        prompt::parse_assessment(&reply)
    }
}
