use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::indicators::Indicators;
use super::report::IncidentReport;
use super::routing::{self, ResponsePlan};
use super::state::{ActionRecord, CaseStatus, ResponseAction, RiskLevel, WorkflowNode, WorkflowState};
use super::WorkflowOptions;
use crate::collaborators::error::CollaboratorError;
use crate::collaborators::history::JsonlHistoryStore;
use crate::collaborators::llm::LlmAnalyst;
use crate::collaborators::secure_endpoint::SecureEndpointClient;
use crate::collaborators::soar::{SplunkSoarClient, TheHiveCaseClient};
use crate::collaborators::splunk::SplunkSearch;
use crate::collaborators::{CaseManagement, CaseRequest, Collaborators, SearchQuery};
use crate::config::{SecOpsConfig, SoarBackend};
use crate::firewall::FirewallManagerClient;

const ANALYST_QUEUE: &str = "security-analyst";
const CASE_TITLE_LIMIT: usize = 80;

/// Outcome of one run. Produced for every input, including failed runs.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub state: WorkflowState,
    pub report: IncidentReport,
    /// Whether the history store accepted the final snapshot.
    pub persisted: bool,
}

impl fmt::Display for WorkflowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.report, f)
    }
}

/// Drives incidents through classification, investigation, assessment and
/// response.
///
/// Cloning is cheap and clones share collaborators, so one instance can serve
/// concurrent runs. Runs share no mutable state.
#[derive(Clone)]
pub struct IncidentWorkflow {
    collaborators: Collaborators,
    options: WorkflowOptions,
}

impl IncidentWorkflow {
    pub fn new(collaborators: Collaborators, options: WorkflowOptions) -> Self {
        Self {
            collaborators,
            options,
        }
    }

    /// Wires the HTTP collaborators described by `config`.
    pub fn from_config(config: &SecOpsConfig) -> Result<Self, CollaboratorError> {
        let timeout = config.workflow.call_timeout;
        let analyst = Arc::new(LlmAnalyst::new(&config.llm, config.verify_ssl, timeout)?);

        let cases: Arc<dyn CaseManagement> = match config.soar.backend {
            SoarBackend::SplunkSoar => Arc::new(SplunkSoarClient::new(
                &config.soar.base_url,
                config.soar.api_token.clone(),
                config.verify_ssl,
                timeout,
            )?),
            SoarBackend::TheHive => Arc::new(TheHiveCaseClient::new(
                config.soar.base_url.clone(),
                config.soar.api_token.clone(),
                config.verify_ssl,
                timeout,
            )?),
        };

        let collaborators = Collaborators {
            classifier: analyst.clone(),
            log_search: Arc::new(SplunkSearch::new(&config.splunk, config.verify_ssl, timeout)?),
            assessor: analyst,
            isolation: Arc::new(SecureEndpointClient::new(
                &config.secure_endpoint,
                config.verify_ssl,
                timeout,
            )?),
            firewall: Arc::new(FirewallManagerClient::new(
                &config.firewall,
                config.verify_ssl,
                FirewallManagerClient::DEFAULT_TIMEOUT,
            )?),
            cases,
            history: Arc::new(JsonlHistoryStore::new(config.history_path.clone())),
        };
        info!(soar_backend = ?config.soar.backend, "Incident workflow configured");
        Ok(Self::new(collaborators, config.workflow.clone()))
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Runs one incident to completion. Collaborator failures end up in the
    /// returned state; this never fails.
    pub async fn run(&self, incident_description: &str) -> WorkflowResult {
        let state = WorkflowState::new(incident_description);
        let span = info_span!("incident_workflow", run_id = %state.run_id());
        self.drive(state).instrument(span).await
    }

    async fn drive(&self, mut state: WorkflowState) -> WorkflowResult {
        info!("Starting incident workflow");
        let mut node = WorkflowNode::Classify;
        loop {
            debug!(node = %node, "Entering workflow node");
            state = state.entering(node);
            let (next_state, next) = match node {
                WorkflowNode::Classify => self.classify(state).await,
                WorkflowNode::DecideInvestigation => {
                    let next = routing::after_classification(
                        state.severity(),
                        state.requires_investigation(),
                    );
                    (state, next)
                }
                WorkflowNode::Investigate => self.investigate(state).await,
                WorkflowNode::Assess => self.assess(state).await,
                WorkflowNode::DecideResponse => {
                    let plan = ResponsePlan::decide(
                        state.threat_level(),
                        self.options.auto_contain_high_threats,
                    );
                    info!(?plan, threat_level = ?state.threat_level(), "Response decided");
                    (state, plan.next_node())
                }
                WorkflowNode::ExecuteResponse => self.execute_response(state).await,
                WorkflowNode::Escalate => self.escalate(state),
                WorkflowNode::Report => return self.report(state).await,
            };
            state = next_state;
            node = next;
        }
    }

    /// Applies the per-call timeout to a collaborator future.
    async fn bounded<T, F>(&self, service: &'static str, call: F) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        match tokio::time::timeout(self.options.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout {
                service,
                limit: self.options.call_timeout,
            }),
        }
    }

    async fn classify(&self, state: WorkflowState) -> (WorkflowState, WorkflowNode) {
        let result = self
            .bounded(
                "classifier",
                self.collaborators
                    .classifier
                    .classify(state.incident_description()),
            )
            .await;

        match result {
            Ok(classification) => {
                let state = state.with_classification(classification);
                if state.severity().is_none() {
                    warn!(label = ?state.severity_label(), "Unrecognised severity label");
                }
                info!(
                    severity = ?state.severity(),
                    requires_investigation = state.requires_investigation(),
                    "Incident classified"
                );
                (state, WorkflowNode::DecideInvestigation)
            }
            Err(e) => {
                error!(kind = ?e.kind(), "Classification failed: {}", e);
                (
                    state.with_error(format!("Classification failed: {}", e)),
                    WorkflowNode::Report,
                )
            }
        }
    }

    async fn investigate(&self, state: WorkflowState) -> (WorkflowState, WorkflowNode) {
        let indicators = Indicators::extract([state.incident_description()]);
        let query = SearchQuery {
            terms: indicators.search_terms(),
            raw_text: state.incident_description().to_string(),
        };

        let result = self
            .bounded("log_search", self.collaborators.log_search.search(&query))
            .await;

        let state = match result {
            Ok(findings) => {
                info!(result_count = findings.result_count, "Investigation complete");
                state.with_findings(findings.summary)
            }
            Err(e) => {
                warn!(kind = ?e.kind(), "Investigation failed, assessing without findings: {}", e);
                state.with_error(format!("Investigation failed: {}", e))
            }
        };
        (state, WorkflowNode::Assess)
    }

    async fn assess(&self, state: WorkflowState) -> (WorkflowState, WorkflowNode) {
        let result = self
            .bounded(
                "assessor",
                self.collaborators.assessor.assess(
                    state.incident_description(),
                    state.severity(),
                    state.investigation_findings(),
                ),
            )
            .await;

        match result {
            Ok(assessment) => {
                let state = state.with_assessment(assessment);
                if state.threat_level().is_none() {
                    warn!(label = ?state.threat_label(), "Unrecognised threat level label");
                }
                info!(threat_level = ?state.threat_level(), "Threat assessed");
                (state, WorkflowNode::DecideResponse)
            }
            Err(e) => {
                error!(kind = ?e.kind(), "Threat assessment failed: {}", e);
                (
                    state.with_error(format!("Threat assessment failed: {}", e)),
                    WorkflowNode::Report,
                )
            }
        }
    }

    async fn execute_response(&self, mut state: WorkflowState) -> (WorkflowState, WorkflowNode) {
        let plan = ResponsePlan::decide(state.threat_level(), self.options.auto_contain_high_threats);
        let indicators = Indicators::extract(
            std::iter::once(state.incident_description()).chain(state.investigation_findings()),
        );
        let before = state.actions_taken().len();
        let mut skipped_containment = false;

        for action in plan.actions() {
            state = match action {
                ResponseAction::IsolateEndpoint => match indicators.endpoint_target() {
                    Some(target) => {
                        let result = self
                            .bounded("endpoint_isolation", self.collaborators.isolation.isolate(target))
                            .await;
                        state.record_action(mitigation_record(*action, target, result))
                    }
                    None => {
                        warn!("No endpoint indicator in the incident, skipping isolation");
                        skipped_containment = true;
                        state
                    }
                },
                ResponseAction::BlockIndicator => match indicators.block_target() {
                    Some(target) => {
                        let result = self
                            .bounded("firewall", self.collaborators.firewall.block(target))
                            .await;
                        state.record_action(mitigation_record(*action, target, result))
                    }
                    None => {
                        warn!("No IP indicator in the incident, skipping firewall block");
                        skipped_containment = true;
                        state
                    }
                },
                ResponseAction::CreateSoarCase => {
                    let target = indicators
                        .block_target()
                        .or(indicators.endpoint_target())
                        .unwrap_or("incident")
                        .to_string();
                    self.create_case(state, &target).await
                }
                ResponseAction::EscalateToAnalyst => record_escalation(state),
            };
        }

        let all_succeeded = state.actions_taken()[before..]
            .iter()
            .all(ActionRecord::succeeded);
        // A containment plan that could not act on any step is never resolved.
        let status = if all_succeeded && !skipped_containment {
            CaseStatus::Resolved
        } else {
            CaseStatus::EscalatedHuman
        };
        info!(%status, skipped_containment, actions = state.actions_taken().len() - before, "Response executed");
        (state.with_case_status(status), WorkflowNode::Report)
    }

    async fn create_case(&self, state: WorkflowState, target: &str) -> WorkflowState {
        let request = CaseRequest {
            run_id: state.run_id(),
            title: case_title(state.incident_description()),
            description: case_description(&state),
            severity: state.severity(),
            threat_level: state.threat_level(),
            actions: state.actions_taken().to_vec(),
        };

        match self
            .bounded("case_management", self.collaborators.cases.create_case(&request))
            .await
        {
            Ok(case_id) => {
                info!(%case_id, "SOAR case created");
                state
                    .record_action(ActionRecord::success(
                        ResponseAction::CreateSoarCase,
                        target,
                        Some(format!("case {}", case_id)),
                    ))
                    .with_soar_case_id(case_id)
            }
            Err(e) => {
                error!(kind = ?e.kind(), "SOAR case creation failed: {}", e);
                state.record_action(ActionRecord::failure(
                    ResponseAction::CreateSoarCase,
                    target,
                    e.to_string(),
                ))
            }
        }
    }

    fn escalate(&self, state: WorkflowState) -> (WorkflowState, WorkflowNode) {
        info!(severity = ?state.severity(), threat_level = ?state.threat_level(), "Escalating to analyst");
        let state = record_escalation(state).with_case_status(CaseStatus::EscalatedHuman);
        (state, WorkflowNode::Report)
    }

    async fn report(&self, state: WorkflowState) -> WorkflowResult {
        let report = IncidentReport::from_state(&state);
        let persisted = match self
            .bounded("history", self.collaborators.history.save(&state))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to persist workflow history: {}", e);
                false
            }
        };
        info!(
            case_status = %state.case_status(),
            actions = state.actions_taken().len(),
            error = ?state.error(),
            persisted,
            "Incident workflow finished"
        );
        WorkflowResult {
            state,
            report,
            persisted,
        }
    }
}

fn mitigation_record(
    action: ResponseAction,
    target: &str,
    result: Result<crate::collaborators::MitigationOutcome, CollaboratorError>,
) -> ActionRecord {
    match result {
        Ok(outcome) if outcome.success => {
            info!(%action, indicator = %target, "Mitigation succeeded");
            ActionRecord::success(action, target, outcome.detail)
        }
        Ok(outcome) => {
            warn!(%action, indicator = %target, "Mitigation was not accepted");
            ActionRecord::failure(
                action,
                target,
                outcome
                    .detail
                    .unwrap_or_else(|| "request was not accepted".to_string()),
            )
        }
        Err(e) => {
            warn!(%action, indicator = %target, kind = ?e.kind(), "Mitigation failed: {}", e);
            ActionRecord::failure(action, target, e.to_string())
        }
    }
}

fn record_escalation(state: WorkflowState) -> WorkflowState {
    let reason = match (state.severity(), state.threat_level()) {
        (Some(RiskLevel::Critical), None) => "critical severity".to_string(),
        (_, Some(level)) => format!("threat level {}", level),
        (Some(level), None) => format!("severity {}", level),
        (None, None) => "unclassified incident".to_string(),
    };
    state.record_action(ActionRecord::success(
        ResponseAction::EscalateToAnalyst,
        ANALYST_QUEUE,
        Some(reason),
    ))
}

fn case_title(description: &str) -> String {
    let mut title: String = description.chars().take(CASE_TITLE_LIMIT).collect();
    if description.chars().count() > CASE_TITLE_LIMIT {
        title.push_str("...");
    }
    format!("Security incident: {}", title)
}

fn case_description(state: &WorkflowState) -> String {
    let mut description = state.incident_description().to_string();
    if let Some(findings) = state.investigation_findings() {
        description.push_str("\n\nInvestigation findings:\n");
        description.push_str(findings);
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_descriptions_are_truncated_in_case_titles() {
        let title = case_title(&"x".repeat(100));
        assert_eq!(title.len(), "Security incident: ".len() + CASE_TITLE_LIMIT + 3);
        assert!(title.ends_with("..."));
        assert_eq!(case_title("short"), "Security incident: short");
    }

    #[test]
    fn escalation_reason_prefers_threat_level() {
        let state = record_escalation(WorkflowState::new("incident"));
        assert_eq!(
            state.actions_taken()[0].detail.as_deref(),
            Some("unclassified incident")
        );
        assert_eq!(state.actions_taken()[0].target, ANALYST_QUEUE);
    }
}
