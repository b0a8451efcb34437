use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::state::{ActionRecord, ActionResult, CaseStatus, RiskLevel, WorkflowNode, WorkflowState};

/// Summary of a finished run, rendered for an analyst.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub incident_description: String,
    pub severity: Option<RiskLevel>,
    pub threat_level: Option<RiskLevel>,
    pub automated_response_suggested: Option<bool>,
    pub recommended_actions: Vec<String>,
    pub investigation_findings: Option<String>,
    pub actions: Vec<ActionRecord>,
    pub case_status: CaseStatus,
    pub soar_case_id: Option<String>,
    pub error: Option<String>,
    pub path: Vec<WorkflowNode>,
}

impl IncidentReport {
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            run_id: state.run_id(),
            generated_at: Utc::now(),
            incident_description: state.incident_description().to_string(),
            severity: state.severity(),
            threat_level: state.threat_level(),
            automated_response_suggested: state.automated_response_suggested(),
            recommended_actions: state.recommended_actions().to_vec(),
            investigation_findings: state.investigation_findings().map(str::to_string),
            actions: state.actions_taken().to_vec(),
            case_status: state.case_status(),
            soar_case_id: state.soar_case_id().map(str::to_string),
            error: state.error().map(str::to_string),
            path: state.visited().to_vec(),
        }
    }
}

fn level(level: Option<RiskLevel>) -> &'static str {
    level.map(|l| l.as_str()).unwrap_or("Unknown")
}

impl fmt::Display for IncidentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SECURITY INCIDENT REPORT")?;
        writeln!(f, "Run: {}", self.run_id)?;
        writeln!(f, "Incident: {}", self.incident_description)?;
        writeln!(f, "Severity: {}", level(self.severity))?;
        writeln!(f, "Threat Level: {}", level(self.threat_level))?;
        if let Some(suggested) = self.automated_response_suggested {
            writeln!(
                f,
                "Automated Response Suggested: {}",
                if suggested { "Yes" } else { "No" }
            )?;
        }
        if !self.recommended_actions.is_empty() {
            writeln!(f, "Recommended Actions: {}", self.recommended_actions.join("; "))?;
        }
        writeln!(f, "Actions Taken: {} actions", self.actions.len())?;
        for action in &self.actions {
            let result = match action.result {
                ActionResult::Success => "success",
                ActionResult::Failure => "failure",
            };
            match &action.detail {
                Some(detail) => writeln!(
                    f,
                    "  - {} {}: {} ({})",
                    action.action, action.target, result, detail
                )?,
                None => writeln!(f, "  - {} {}: {}", action.action, action.target, result)?,
            }
        }
        writeln!(f, "Status: {}", self.case_status)?;
        if let Some(case_id) = &self.soar_case_id {
            writeln!(f, "SOAR Case: {}", case_id)?;
        }
        writeln!(
            f,
            "Investigation: {}",
            self.investigation_findings
                .as_deref()
                .unwrap_or("No investigation performed")
        )?;
        if let Some(error) = &self.error {
            writeln!(f, "Error: {}", error)?;
        }
        let path: Vec<&str> = self.path.iter().map(|n| n.as_str()).collect();
        write!(f, "Path: {}", path.join(" -> "))
    }
}
