//! The incident response workflow.
//!
//! A run moves one [`state::WorkflowState`] through a fixed graph of nodes:
//! classification, an optional log investigation, threat assessment, and
//! either automated containment or escalation to an analyst. Every path ends
//! in the report node, which persists the final snapshot.

use std::time::Duration;

pub mod indicators;
pub mod report;
pub mod routing;
pub mod sequencer;
pub mod state;

pub use report::IncidentReport;
pub use routing::ResponsePlan;
pub use sequencer::{IncidentWorkflow, WorkflowResult};
pub use state::{
    ActionRecord, ActionResult, CaseStatus, ResponseAction, RiskLevel, WorkflowNode, WorkflowState,
};

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Upper bound for any single collaborator call.
    pub call_timeout: Duration,
    /// When false, High and Critical threats go to an analyst instead of
    /// being contained automatically.
    pub auto_contain_high_threats: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            auto_contain_high_threats: true,
        }
    }
}
