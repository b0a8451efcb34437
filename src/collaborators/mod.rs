//! Contracts for the external services the incident workflow calls, and
//! their HTTP implementations.
//!
//! The workflow only sees the traits in this module. Each trait has one
//! production implementation backed by `reqwest`; tests substitute scripted
//! in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::workflow::state::{ActionRecord, RiskLevel, WorkflowState};

pub mod error;
pub mod history;
pub(crate) mod http;
pub mod llm;
pub mod prompt;
pub mod secure_endpoint;
pub mod soar;
pub mod splunk;

pub use error::{CollaboratorError, FailureKind};

/// What the classifier made of an incident description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Raw label, mapped to a [`RiskLevel`] by the workflow.
    pub severity_label: String,
    pub requires_investigation: bool,
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub threat_label: String,
    /// `Some(true)` when the model suggested an automated response.
    pub automated_response: Option<bool>,
    pub recommended_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Indicators (IP addresses, hosts) pulled from the incident text.
    pub terms: Vec<String>,
    /// The incident description, used when no indicator is available.
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub result_count: usize,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationOutcome {
    pub success: bool,
    pub detail: Option<String>,
}

/// Payload sent to the case-management system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRequest {
    pub run_id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: Option<RiskLevel>,
    pub threat_level: Option<RiskLevel>,
    pub actions: Vec<ActionRecord>,
}

impl CaseRequest {
    /// The most specific level known for the incident.
    pub fn effective_level(&self) -> Option<RiskLevel> {
        self.threat_level.or(self.severity)
    }
}

#[async_trait]
pub trait IncidentClassifier: Send + Sync {
    async fn classify(&self, incident: &str) -> Result<Classification, CollaboratorError>;
}

#[async_trait]
pub trait LogSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Findings, CollaboratorError>;
}

#[async_trait]
pub trait ThreatAssessor: Send + Sync {
    async fn assess(
        &self,
        incident: &str,
        severity: Option<RiskLevel>,
        findings: Option<&str>,
    ) -> Result<ThreatAssessment, CollaboratorError>;
}

#[async_trait]
pub trait EndpointIsolation: Send + Sync {
    async fn isolate(&self, target: &str) -> Result<MitigationOutcome, CollaboratorError>;
}

#[async_trait]
pub trait FirewallBlock: Send + Sync {
    async fn block(&self, indicator: &str) -> Result<MitigationOutcome, CollaboratorError>;
}

#[async_trait]
pub trait CaseManagement: Send + Sync {
    /// Returns the identifier of the created case.
    async fn create_case(&self, request: &CaseRequest) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, state: &WorkflowState) -> Result<(), CollaboratorError>;
}

/// The full set of services one workflow needs.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn IncidentClassifier>,
    pub log_search: Arc<dyn LogSearch>,
    pub assessor: Arc<dyn ThreatAssessor>,
    pub isolation: Arc<dyn EndpointIsolation>,
    pub firewall: Arc<dyn FirewallBlock>,
    pub cases: Arc<dyn CaseManagement>,
    pub history: Arc<dyn HistoryStore>,
}
