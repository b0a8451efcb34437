use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::collaborators::error::CollaboratorError;
use crate::collaborators::http::{build_client, expect_success, join_url};
use crate::collaborators::{FirewallBlock, MitigationOutcome};
use crate::config::FirewallSettings;

const SERVICE: &str = "firewall";

/// Bearer-authenticated client for the firewall management REST API.
///
/// Serves both the URL-table tools and the block step of the incident
/// workflow.
#[derive(Debug, Clone)]
pub struct FirewallManagerClient {
    client: Client,
    base_url: String,
    api_key: String,
    block_path: String,
}

impl FirewallManagerClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(
        settings: &FirewallSettings,
        verify_ssl: bool,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        debug!(base_url = %settings.base_url, %verify_ssl, "Creating firewall manager client");
        let client = build_client(SERVICE, verify_ssl, timeout)?;
        info!("Firewall manager API client initialized");
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            block_path: settings.block_path.clone(),
        })
    }

    fn request(&self, method: Method, api_path: &str) -> RequestBuilder {
        self.client
            .request(method, join_url(&self.base_url, api_path))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }

    async fn send(
        &self,
        method: Method,
        api_path: &str,
        builder: RequestBuilder,
    ) -> Result<Value, CollaboratorError> {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(%method, api_path, "Firewall request failed: {}", e);
                return Err(e.into());
            }
        };
        let text = expect_success(SERVICE, response).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(if method == Method::DELETE {
                json!({"status": "deleted"})
            } else {
                Value::Null
            });
        }
        serde_json::from_str(&text).map_err(|e| CollaboratorError::MalformedResponse {
            service: SERVICE,
            reason: format!("{} {}: {}", method, api_path, e),
        })
    }

    pub async fn get(
        &self,
        api_path: &str,
        params: &[(String, String)],
    ) -> Result<Value, CollaboratorError> {
        debug!(api_path, ?params, "GET firewall resource");
        let builder = self.request(Method::GET, api_path).query(params);
        self.send(Method::GET, api_path, builder).await
    }

    pub async fn post(&self, api_path: &str, data: &Value) -> Result<Value, CollaboratorError> {
        debug!(api_path, "POST firewall resource");
        let builder = self.request(Method::POST, api_path).json(data);
        self.send(Method::POST, api_path, builder).await
    }

    pub async fn put(&self, api_path: &str, data: &Value) -> Result<Value, CollaboratorError> {
        debug!(api_path, "PUT firewall resource");
        let builder = self.request(Method::PUT, api_path).json(data);
        self.send(Method::PUT, api_path, builder).await
    }

    pub async fn delete(
        &self,
        api_path: &str,
        params: &[(String, String)],
    ) -> Result<Value, CollaboratorError> {
        debug!(api_path, ?params, "DELETE firewall resource");
        let builder = self.request(Method::DELETE, api_path).query(params);
        self.send(Method::DELETE, api_path, builder).await
    }
}

#[async_trait]
impl FirewallBlock for FirewallManagerClient {
    async fn block(&self, indicator: &str) -> Result<MitigationOutcome, CollaboratorError> {
        let ip: IpAddr = indicator.parse().map_err(|_| {
            CollaboratorError::InvalidInput(format!("'{}' is not an IP address", indicator))
        })?;
        info!(%ip, "Blocking indicator on the firewall");

        let body = json!({
            "name": format!("incident-block-{}", ip),
            "type": "Host",
            "value": ip.to_string(),
            "action": "BLOCK",
            "description": "Blocked by the incident response workflow",
        });
        let response = self.post(&self.block_path, &body).await?;
        let detail = response
            .get("id")
            .map(|id| match id {
                Value::String(s) => format!("block rule {}", s),
                other => format!("block rule {}", other),
            })
            .unwrap_or_else(|| format!("{} blocked", ip));
        Ok(MitigationOutcome {
            success: true,
            detail: Some(detail),
        })
    }
}
