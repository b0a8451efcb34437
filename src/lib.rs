//! # Security Operations MCP Server
//!
//! Automated security incident response, exposed to MCP clients over stdio.
//!
//! ## Features
//!
//! - Incident workflow: LLM classification, Splunk investigation, threat
//!   assessment, then containment or escalation to an analyst
//! - Endpoint isolation through Cisco Secure Endpoint
//! - Firewall blocking, plus a catalog of firewall management tools generated
//!   from a JSON URL table
//! - Case creation in Splunk SOAR or TheHive (through thehive-client-rs)
//! - JSON-lines history of every run
//!
//! ## Usage
//!
//! The server is typically run as a standalone binary that communicates
//! over stdio with MCP clients. `--incident "<text>"` runs one incident and
//! prints the result instead.

pub mod collaborators;
pub mod config;
pub mod firewall;
pub mod workflow;

pub use collaborators::{CollaboratorError, Collaborators, FailureKind};
pub use config::{ConfigError, SecOpsConfig};
pub use firewall::{CatalogError, FirewallToolCatalog};
pub use workflow::{IncidentWorkflow, WorkflowOptions, WorkflowResult, WorkflowState};
