use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use crate::collaborators::{Classification, ThreatAssessment};

/// Severity and threat labels produced by the model.
///
/// The four values are treated as an unordered set: routing matches on each
/// variant explicitly and never compares them numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Maps a label such as `"High"`, `"critical"` or `"[Medium]"` to a level.
    /// Returns `None` for anything outside the four known values.
    pub fn from_label(label: &str) -> Option<Self> {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| matches!(c, '[' | ']' | '*' | '"' | '\'' | '.' | '`'))
            .trim()
            .to_ascii_lowercase();
        match cleaned.as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    EscalatedHuman,
    Resolved,
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Open => write!(f, "Open"),
            CaseStatus::EscalatedHuman => write!(f, "EscalatedHuman"),
            CaseStatus::Resolved => write!(f, "Resolved"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    IsolateEndpoint,
    BlockIndicator,
    CreateSoarCase,
    EscalateToAnalyst,
}

impl ResponseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseAction::IsolateEndpoint => "isolate_endpoint",
            ResponseAction::BlockIndicator => "block_indicator",
            ResponseAction::CreateSoarCase => "create_soar_case",
            ResponseAction::EscalateToAnalyst => "escalate_to_analyst",
        }
    }
}

impl fmt::Display for ResponseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mitigation or escalation call made during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: ResponseAction,
    pub target: String,
    pub result: ActionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    pub fn success(action: ResponseAction, target: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            action,
            target: target.into(),
            result: ActionResult::Success,
            detail,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(action: ResponseAction, target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
            result: ActionResult::Failure,
            detail: Some(detail.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result == ActionResult::Success
    }
}

/// The nodes of the incident workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNode {
    Classify,
    DecideInvestigation,
    Investigate,
    Assess,
    DecideResponse,
    ExecuteResponse,
    Escalate,
    Report,
}

impl WorkflowNode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowNode::Classify => "classify",
            WorkflowNode::DecideInvestigation => "decide_investigation",
            WorkflowNode::Investigate => "investigate",
            WorkflowNode::Assess => "assess",
            WorkflowNode::DecideResponse => "decide_response",
            WorkflowNode::ExecuteResponse => "execute_response",
            WorkflowNode::Escalate => "escalate",
            WorkflowNode::Report => "report",
        }
    }

    /// Nodes that call a collaborator, as opposed to pure branch points.
    pub fn performs_io(&self) -> bool {
        !matches!(
            self,
            WorkflowNode::DecideInvestigation | WorkflowNode::DecideResponse
        )
    }
}

impl fmt::Display for WorkflowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record threaded through one workflow run.
///
/// Steps take the state by value and hand back the next snapshot. The
/// transition methods below are the only way to change it, which keeps
/// `actions_taken` append-only, `soar_case_id` write-once and `error`
/// pinned to the first failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    incident_description: String,
    severity: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classification_reasoning: Option<String>,
    requires_investigation: bool,
    investigation_findings: Option<String>,
    threat_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threat_label: Option<String>,
    /// Audit only. Routing follows the configured decision table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    automated_response_suggested: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    recommended_actions: Vec<String>,
    actions_taken: Vec<ActionRecord>,
    case_status: CaseStatus,
    soar_case_id: Option<String>,
    error: Option<String>,
    visited: Vec<WorkflowNode>,
}

impl WorkflowState {
    pub fn new(incident_description: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            incident_description: incident_description.into(),
            severity: None,
            severity_label: None,
            classification_reasoning: None,
            requires_investigation: false,
            investigation_findings: None,
            threat_level: None,
            threat_label: None,
            automated_response_suggested: None,
            recommended_actions: Vec::new(),
            actions_taken: Vec::new(),
            case_status: CaseStatus::Open,
            soar_case_id: None,
            error: None,
            visited: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn incident_description(&self) -> &str {
        &self.incident_description
    }

    pub fn severity(&self) -> Option<RiskLevel> {
        self.severity
    }

    /// The raw label the classifier produced, recognised or not.
    pub fn severity_label(&self) -> Option<&str> {
        self.severity_label.as_deref()
    }

    pub fn classification_reasoning(&self) -> Option<&str> {
        self.classification_reasoning.as_deref()
    }

    pub fn requires_investigation(&self) -> bool {
        self.requires_investigation
    }

    pub fn investigation_findings(&self) -> Option<&str> {
        self.investigation_findings.as_deref()
    }

    pub fn threat_level(&self) -> Option<RiskLevel> {
        self.threat_level
    }

    pub fn threat_label(&self) -> Option<&str> {
        self.threat_label.as_deref()
    }

    pub fn automated_response_suggested(&self) -> Option<bool> {
        self.automated_response_suggested
    }

    pub fn recommended_actions(&self) -> &[String] {
        &self.recommended_actions
    }

    pub fn actions_taken(&self) -> &[ActionRecord] {
        &self.actions_taken
    }

    pub fn case_status(&self) -> CaseStatus {
        self.case_status
    }

    pub fn soar_case_id(&self) -> Option<&str> {
        self.soar_case_id.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn visited(&self) -> &[WorkflowNode] {
        &self.visited
    }

    pub fn has_visited(&self, node: WorkflowNode) -> bool {
        self.visited.contains(&node)
    }

    pub(crate) fn entering(mut self, node: WorkflowNode) -> Self {
        self.visited.push(node);
        self
    }

    pub(crate) fn with_classification(mut self, classification: Classification) -> Self {
        if self.severity_label.is_some() {
            warn!(run_id = %self.run_id, "Ignoring second classification for the same run");
            return self;
        }
        self.severity = RiskLevel::from_label(&classification.severity_label);
        self.severity_label = Some(classification.severity_label);
        self.requires_investigation = classification.requires_investigation;
        self.classification_reasoning = classification.reasoning;
        self
    }

    pub(crate) fn with_findings(mut self, findings: String) -> Self {
        self.investigation_findings = Some(match self.investigation_findings.take() {
            Some(existing) => format!("{}\n{}", existing, findings),
            None => findings,
        });
        self
    }

    pub(crate) fn with_assessment(mut self, assessment: ThreatAssessment) -> Self {
        self.threat_level = RiskLevel::from_label(&assessment.threat_label);
        self.threat_label = Some(assessment.threat_label);
        self.automated_response_suggested = assessment.automated_response;
        self.recommended_actions = assessment.recommended_actions;
        self
    }

    pub(crate) fn record_action(mut self, record: ActionRecord) -> Self {
        self.actions_taken.push(record);
        self
    }

    pub(crate) fn with_soar_case_id(mut self, case_id: String) -> Self {
        match &self.soar_case_id {
            Some(existing) => {
                warn!(
                    run_id = %self.run_id,
                    %existing,
                    ignored = %case_id,
                    "SOAR case id already set for this run"
                );
            }
            None => self.soar_case_id = Some(case_id),
        }
        self
    }

    /// Case status only ever leaves `Open`; a terminal status is kept.
    pub(crate) fn with_case_status(mut self, status: CaseStatus) -> Self {
        if self.case_status == CaseStatus::Open {
            self.case_status = status;
        }
        self
    }

    pub(crate) fn with_error(mut self, message: impl Into<String>) -> Self {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
        self
    }
}
