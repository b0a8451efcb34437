use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::CollaboratorError;
use super::http::{build_client, expect_success, join_url};
use super::{EndpointIsolation, MitigationOutcome};
use crate::config::SecureEndpointSettings;

const SERVICE: &str = "secure_endpoint";

static TARGET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.:\-]{0,127}$").expect("valid target regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationResponse {
    pub data: IsolationData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationData {
    #[serde(default)]
    pub available: bool,
    pub status: String,
    #[serde(default)]
    pub unlock_code: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl IsolationData {
    /// `pending_start` and `isolated` both mean the request was accepted.
    pub fn is_isolating(&self) -> bool {
        matches!(self.status.as_str(), "pending_start" | "isolated")
    }
}

/// Client for the Cisco Secure Endpoint computer isolation API.
#[derive(Debug, Clone)]
pub struct SecureEndpointClient {
    client: Client,
    base_url: String,
    client_id: String,
    api_key: String,
}

impl SecureEndpointClient {
    pub fn new(
        settings: &SecureEndpointSettings,
        verify_ssl: bool,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        debug!(base_url = %settings.base_url, "Creating Secure Endpoint client");
        Ok(Self {
            client: build_client(SERVICE, verify_ssl, timeout)?,
            base_url: settings.base_url.clone(),
            client_id: settings.client_id.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn isolation_url(&self, connector_guid: &str) -> Result<String, CollaboratorError> {
        if !TARGET_PATTERN.is_match(connector_guid) {
            return Err(CollaboratorError::InvalidInput(format!(
                "'{}' is not a valid endpoint identifier",
                connector_guid
            )));
        }
        Ok(join_url(
            &self.base_url,
            &format!("/v1/computers/{}/isolation", connector_guid),
        ))
    }

    pub async fn isolation_status(
        &self,
        connector_guid: &str,
    ) -> Result<IsolationData, CollaboratorError> {
        let url = self.isolation_url(connector_guid)?;
        debug!(connector_guid, "Fetching endpoint isolation status");
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.client_id, Some(&self.api_key))
            .send()
            .await?;
        let body: IsolationResponse = expect_success(SERVICE, response).await?.json().await?;
        Ok(body.data)
    }

    pub async fn start_isolation(
        &self,
        connector_guid: &str,
    ) -> Result<IsolationData, CollaboratorError> {
        let url = self.isolation_url(connector_guid)?;
        info!(connector_guid, "Requesting endpoint isolation");
        let response = self
            .client
            .put(&url)
            .basic_auth(&self.client_id, Some(&self.api_key))
            .send()
            .await?;
        let body: IsolationResponse = expect_success(SERVICE, response).await?.json().await?;
        Ok(body.data)
    }
}

#[async_trait]
impl EndpointIsolation for SecureEndpointClient {
    async fn isolate(&self, target: &str) -> Result<MitigationOutcome, CollaboratorError> {
        let data = self.start_isolation(target).await?;
        let success = data.is_isolating();
        if !success {
            warn!(connector_guid = %target, status = %data.status, "Isolation request was not accepted");
        }
        Ok(MitigationOutcome {
            success,
            detail: Some(
                data.comment
                    .unwrap_or_else(|| format!("isolation status: {}", data.status)),
            ),
        })
    }
}
