//! Branch decisions. Both tables match every [`RiskLevel`] explicitly.

use super::state::{ResponseAction, RiskLevel, WorkflowNode};

/// Where a run goes after classification.
///
/// Critical incidents skip investigation and go straight to an analyst. An
/// unrecognised severity is treated the same way.
pub fn after_classification(
    severity: Option<RiskLevel>,
    requires_investigation: bool,
) -> WorkflowNode {
    match (severity, requires_investigation) {
        (None, _) => WorkflowNode::Escalate,
        (Some(RiskLevel::Critical), _) => WorkflowNode::Escalate,
        (Some(RiskLevel::Low | RiskLevel::Medium | RiskLevel::High), true) => {
            WorkflowNode::Investigate
        }
        (Some(RiskLevel::Low | RiskLevel::Medium | RiskLevel::High), false) => {
            WorkflowNode::Escalate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePlan {
    /// Isolate, block, then open a SOAR case.
    Contain,
    /// Open a SOAR case and nothing else.
    CaseOnly,
    Escalate,
}

impl ResponsePlan {
    pub fn decide(threat_level: Option<RiskLevel>, auto_contain_high_threats: bool) -> Self {
        match threat_level {
            None => ResponsePlan::Escalate,
            Some(RiskLevel::Low) | Some(RiskLevel::Medium) => ResponsePlan::CaseOnly,
            Some(RiskLevel::High) | Some(RiskLevel::Critical) => {
                if auto_contain_high_threats {
                    ResponsePlan::Contain
                } else {
                    ResponsePlan::Escalate
                }
            }
        }
    }

    pub fn next_node(&self) -> WorkflowNode {
        match self {
            ResponsePlan::Contain | ResponsePlan::CaseOnly => WorkflowNode::ExecuteResponse,
            ResponsePlan::Escalate => WorkflowNode::Escalate,
        }
    }

    /// Actions in execution order.
    pub fn actions(&self) -> &'static [ResponseAction] {
        match self {
            ResponsePlan::Contain => &[
                ResponseAction::IsolateEndpoint,
                ResponseAction::BlockIndicator,
                ResponseAction::CreateSoarCase,
            ],
            ResponsePlan::CaseOnly => &[ResponseAction::CreateSoarCase],
            ResponsePlan::Escalate => &[ResponseAction::EscalateToAnalyst],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_severity_always_escalates() {
        assert_eq!(
            after_classification(Some(RiskLevel::Critical), true),
            WorkflowNode::Escalate
        );
        assert_eq!(
            after_classification(Some(RiskLevel::Critical), false),
            WorkflowNode::Escalate
        );
    }

    #[test]
    fn investigation_follows_the_classifier_otherwise() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            assert_eq!(after_classification(Some(level), true), WorkflowNode::Investigate);
            assert_eq!(after_classification(Some(level), false), WorkflowNode::Escalate);
        }
        assert_eq!(after_classification(None, true), WorkflowNode::Escalate);
    }

    #[test]
    fn response_table() {
        assert_eq!(ResponsePlan::decide(Some(RiskLevel::Low), true), ResponsePlan::CaseOnly);
        assert_eq!(ResponsePlan::decide(Some(RiskLevel::Medium), false), ResponsePlan::CaseOnly);
        assert_eq!(ResponsePlan::decide(Some(RiskLevel::High), true), ResponsePlan::Contain);
        assert_eq!(ResponsePlan::decide(Some(RiskLevel::Critical), true), ResponsePlan::Contain);
        assert_eq!(ResponsePlan::decide(Some(RiskLevel::High), false), ResponsePlan::Escalate);
        assert_eq!(ResponsePlan::decide(Some(RiskLevel::Critical), false), ResponsePlan::Escalate);
        assert_eq!(ResponsePlan::decide(None, true), ResponsePlan::Escalate);
    }

    #[test]
    fn containment_runs_isolation_before_block_before_case() {
        assert_eq!(
            ResponsePlan::Contain.actions(),
            &[
                ResponseAction::IsolateEndpoint,
                ResponseAction::BlockIndicator,
                ResponseAction::CreateSoarCase
            ]
        );
        assert_eq!(ResponsePlan::CaseOnly.next_node(), WorkflowNode::ExecuteResponse);
        assert_eq!(ResponsePlan::Escalate.next_node(), WorkflowNode::Escalate);
    }
}
