use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a collaborator failure should be treated by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeouts, connection failures, 5xx and 429 responses.
    Transient,
    /// 4xx responses, authentication failures, malformed bodies.
    Permanent,
    /// The collaborator answered but the answer could not be mapped.
    Parse,
}

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Failed to create HTTP client: {0}")]
    HttpClientCreationError(reqwest::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("{service} did not answer within {limit:?}")]
    Timeout {
        service: &'static str,
        limit: std::time::Duration,
    },

    #[error("{service} is unavailable (status {status}): {body}")]
    Unavailable {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} rejected the request (status {status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed response from {service}: {reason}")]
    MalformedResponse {
        service: &'static str,
        reason: String,
    },

    #[error("Could not interpret {service} output: {reason}")]
    ParseError {
        service: &'static str,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("History store error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TheHive client error: {0}")]
    TheHiveError(String),
}

impl CollaboratorError {
    /// Maps a non-success HTTP status to the matching error variant.
    pub fn from_status(service: &'static str, status: StatusCode, body: String) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            CollaboratorError::AuthenticationError(format!(
                "{} returned {}: {}",
                service,
                status.as_u16(),
                body
            ))
        } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            CollaboratorError::Unavailable {
                service,
                status: status.as_u16(),
                body,
            }
        } else {
            CollaboratorError::Rejected {
                service,
                status: status.as_u16(),
                body,
            }
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            CollaboratorError::Timeout { .. } | CollaboratorError::Unavailable { .. } => {
                FailureKind::Transient
            }
            CollaboratorError::RequestError(e) => {
                let server_side = e.status().map(|s| s.is_server_error()).unwrap_or(false);
                if e.is_timeout() || e.is_connect() || server_side {
                    FailureKind::Transient
                } else {
                    FailureKind::Permanent
                }
            }
            CollaboratorError::ParseError { .. } => FailureKind::Parse,
            CollaboratorError::HttpClientCreationError(_)
            | CollaboratorError::Rejected { .. }
            | CollaboratorError::AuthenticationError(_)
            | CollaboratorError::JsonError(_)
            | CollaboratorError::MalformedResponse { .. }
            | CollaboratorError::InvalidInput(_)
            | CollaboratorError::Io(_)
            | CollaboratorError::TheHiveError(_) => FailureKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

impl From<thehive_client::apis::Error<thehive_client::apis::case_api::CreateCaseError>>
    for CollaboratorError
{
    fn from(
        error: thehive_client::apis::Error<thehive_client::apis::case_api::CreateCaseError>,
    ) -> Self {
        CollaboratorError::TheHiveError(format!("Create Case API error: {}", error))
    }
}
