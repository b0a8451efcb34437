use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, error};

use super::error::CollaboratorError;

pub(crate) fn build_client(
    service: &'static str,
    verify_ssl: bool,
    timeout: Duration,
) -> Result<Client, CollaboratorError> {
    debug!(service, %verify_ssl, ?timeout, "Creating HTTP client");
    Client::builder()
        .danger_accept_invalid_certs(!verify_ssl)
        .timeout(timeout)
        .user_agent(concat!("mcp-server-secops/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(CollaboratorError::HttpClientCreationError)
}

/// Passes 2xx responses through and turns anything else into a classified error.
pub(crate) async fn expect_success(
    service: &'static str,
    response: Response,
) -> Result<Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    error!(service, status = status.as_u16(), %body, "Collaborator returned an error status");
    Err(CollaboratorError::from_status(service, status, body))
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
