use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thehive_client::{
    apis::{case_api, configuration::Configuration},
    models::{input_case::Severity as InputCaseSeverity, InputCase},
};
use tracing::{debug, error, info};

use super::error::CollaboratorError;
use super::http::{build_client, expect_success, join_url};
use super::{CaseManagement, CaseRequest};
use crate::workflow::state::RiskLevel;

/// Splunk SOAR container (case) creation.
#[derive(Debug, Clone)]
pub struct SplunkSoarClient {
    client: Client,
    endpoint: String,
    api_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContainerResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    existing_container_id: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl SplunkSoarClient {
    const SERVICE: &'static str = "splunk_soar";

    pub fn new(
        base_url: &str,
        api_token: String,
        verify_ssl: bool,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        debug!(%base_url, "Creating Splunk SOAR client");
        Ok(Self {
            client: build_client(Self::SERVICE, verify_ssl, timeout)?,
            endpoint: join_url(base_url, "/rest/container"),
            api_token,
        })
    }

    pub fn container_payload(request: &CaseRequest) -> Value {
        let severity = match request.effective_level() {
            Some(RiskLevel::Low) => "low",
            Some(RiskLevel::Medium) | None => "medium",
            Some(RiskLevel::High) | Some(RiskLevel::Critical) => "high",
        };
        let mut tags = vec!["incident-workflow".to_string()];
        if let Some(level) = request.threat_level {
            tags.push(format!("threat-{}", level.as_str().to_lowercase()));
        }
        json!({
            "name": request.title,
            "description": request.description,
            "label": "events",
            "severity": severity,
            "status": "new",
            "source_data_identifier": request.run_id.to_string(),
            "tags": tags,
            "data": {
                "severity": request.severity.map(|s| s.as_str()),
                "threat_level": request.threat_level.map(|t| t.as_str()),
                "actions": request.actions,
            }
        })
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl CaseManagement for SplunkSoarClient {
    async fn create_case(&self, request: &CaseRequest) -> Result<String, CollaboratorError> {
        info!(title = %request.title, "Creating Splunk SOAR container");
        let response = self
            .client
            .post(&self.endpoint)
            .header("ph-auth-token", &self.api_token)
            .json(&Self::container_payload(request))
            .send()
            .await?;
        let body: ContainerResponse = expect_success(Self::SERVICE, response).await?.json().await?;

        if body.success {
            if let Some(id) = body.id.as_ref().and_then(id_to_string) {
                debug!(container_id = %id, "Splunk SOAR container created");
                return Ok(id);
            }
        }
        // Duplicate submissions report the container they collided with.
        if let Some(id) = body.existing_container_id.as_ref().and_then(id_to_string) {
            info!(container_id = %id, "Splunk SOAR reused an existing container");
            return Ok(id);
        }
        Err(CollaboratorError::MalformedResponse {
            service: Self::SERVICE,
            reason: body
                .message
                .unwrap_or_else(|| "container response carried no id".to_string()),
        })
    }
}

/// Case creation through TheHive, for deployments that track incidents there.
#[derive(Debug, Clone)]
pub struct TheHiveCaseClient {
    configuration: Configuration,
}

impl TheHiveCaseClient {
    pub fn new(
        base_url: String,
        api_token: String,
        verify_ssl: bool,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        debug!(%base_url, %verify_ssl, "Creating TheHive case client");
        let client = build_client("thehive", verify_ssl, timeout)?;

        let configuration = Configuration {
            base_path: base_url,
            user_agent: Some(concat!("mcp-server-secops/", env!("CARGO_PKG_VERSION")).to_string()),
            client,
            basic_auth: None,
            oauth_access_token: None,
            bearer_access_token: Some(api_token),
            api_key: None,
        };

        Ok(Self { configuration })
    }

    pub fn input_case(request: &CaseRequest) -> InputCase {
        let severity = match request.effective_level() {
            Some(RiskLevel::Low) => InputCaseSeverity::Variant1,
            Some(RiskLevel::Medium) | None => InputCaseSeverity::Variant2,
            Some(RiskLevel::High) => InputCaseSeverity::Variant3,
            Some(RiskLevel::Critical) => InputCaseSeverity::Variant4,
        };
        InputCase {
            title: request.title.clone(),
            description: request.description.clone(),
            severity: Some(Some(severity)),
            tags: Some(Some(vec![
                "incident-workflow".to_string(),
                format!("run:{}", request.run_id),
            ])),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CaseManagement for TheHiveCaseClient {
    async fn create_case(&self, request: &CaseRequest) -> Result<String, CollaboratorError> {
        info!("Creating case titled: {}", request.title);

        match case_api::create_case(&self.configuration, Self::input_case(request), None).await {
            Ok(case) => {
                debug!("Successfully created case with ID: {}", case._id);
                Ok(case._id)
            }
            Err(e) => {
                error!("Failed to create case in TheHive: {}", e);
                Err(CollaboratorError::from(e))
            }
        }
    }
}
