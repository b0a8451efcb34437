//! Firewall management API access.
//!
//! [`client::FirewallManagerClient`] talks to the management REST API and
//! doubles as the workflow's block collaborator. [`catalog`] turns a JSON
//! table of API URLs into named tools that can be listed and invoked.

pub mod catalog;
pub mod client;

pub use catalog::{
    CatalogError, FirewallTool, FirewallToolCatalog, FirewallToolbox, HttpMethod, ToolInvocation,
};
pub use client::FirewallManagerClient;
