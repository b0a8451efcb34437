//
// Purpose:
//
// This Rust application implements an MCP (Model Context Protocol) server for security
// operations. It runs the automated incident response workflow (classification, Splunk
// investigation, threat assessment, containment or escalation) and exposes the firewall
// management API as a catalog of tools generated from a JSON URL table.
//
// Structure:
// - `main()`: Entry point. Loads `.env`, initializes logging (tracing, on stderr), reads the
//   configuration and either runs a single incident (`--incident`) or starts the MCP server
//   on stdio.
//
// - `SecOpsToolsServer`: Implements `rmcp::ServerHandler` with `#[tool(tool_box)]`.
//   - Holds the incident workflow, the firewall tool catalog bound to its API client, and
//     a Secure Endpoint client for isolation status lookups.
//
// - Tool Parameter Structs (e.g., `RunIncidentWorkflowParams`, `CallFirewallToolParams`):
//   - `serde::Deserialize` for input, `schemars::JsonSchema` for the schema shown to clients.
//
// Workflow:
// 1. Server starts and listens for MCP requests on stdio.
// 2. MCP client sends a `call_tool` request.
// 3. `SecOpsToolsServer` dispatches to the tool method.
// 4. The tool runs the workflow or calls the relevant API.
// 5. The result is packaged into a `CallToolResult`. Domain failures are reported with
//    `isError` set rather than as protocol errors.
//
// Configuration:
// See `SecOpsConfig::from_env` for the environment variables. Logging is controlled by
// `RUST_LOG`.

use clap::Parser;
use dotenv::dotenv;
use mcp_server_secops::collaborators::secure_endpoint::SecureEndpointClient;
use mcp_server_secops::config::SecOpsConfig;
use mcp_server_secops::firewall::{
    CatalogError, FirewallManagerClient, FirewallToolCatalog, FirewallToolbox, ToolInvocation,
};
use mcp_server_secops::workflow::IncidentWorkflow;
use rmcp::{
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    schemars, tool,
    transport::stdio,
    Error as McpError, ServerHandler, ServiceExt,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "mcp-server-secops")]
#[command(about = "Security operations MCP server and incident response workflow")]
struct Args {
    /// JSON table of firewall API URLs (overrides FIREWALL_TOOLS_FILE)
    #[arg(long)]
    tools_file: Option<PathBuf>,

    /// Run the workflow once for this incident, print the result as JSON and exit
    #[arg(long)]
    incident: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct RunIncidentWorkflowParams {
    #[schemars(description = "Free-text description of the security incident")]
    incident_description: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct ListFirewallToolsParams {
    #[schemars(description = "Only list tools whose name contains this text")]
    name_filter: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct CallFirewallToolParams {
    #[schemars(description = "Name of the firewall tool, as returned by list_firewall_tools")]
    tool_name: String,
    #[schemars(
        description = "Filter expression sent as the 'filter' query parameter (e.g., \"name:web-servers\"). Only meaningful for tools that support filtering."
    )]
    filter_expression: Option<String>,
    #[schemars(
        description = "Values for {placeholder} segments of the tool's endpoint (e.g., domainUUID); remaining entries are sent as query parameters."
    )]
    query_params: Option<HashMap<String, String>>,
    #[schemars(description = "JSON body for POST and PUT tools.")]
    payload: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct GetEndpointIsolationStatusParams {
    #[schemars(description = "Secure Endpoint connector GUID of the computer")]
    connector_guid: String,
}

#[derive(Clone)]
struct SecOpsToolsServer {
    workflow: IncidentWorkflow,
    firewall_tools: Arc<FirewallToolbox>,
    secure_endpoint: Arc<SecureEndpointClient>,
}

fn load_catalog(path: &Path) -> Result<FirewallToolCatalog, CatalogError> {
    match FirewallToolCatalog::load(path) {
        Err(CatalogError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                path = %path.display(),
                "Firewall tool table not found, no firewall tools will be available"
            );
            Ok(FirewallToolCatalog::default())
        }
        other => other,
    }
}

#[tool(tool_box)]
impl SecOpsToolsServer {
    fn new(config: &SecOpsConfig) -> Result<Self, anyhow::Error> {
        tracing::debug!(
            tools_file = %config.firewall.tools_file.display(),
            verify_ssl = config.verify_ssl,
            "Creating security operations tools server"
        );

        let workflow = IncidentWorkflow::from_config(config)?;

        let catalog = load_catalog(&config.firewall.tools_file)?;
        let firewall_client = FirewallManagerClient::new(
            &config.firewall,
            config.verify_ssl,
            FirewallManagerClient::DEFAULT_TIMEOUT,
        )?;

        let secure_endpoint = SecureEndpointClient::new(
            &config.secure_endpoint,
            config.verify_ssl,
            config.workflow.call_timeout,
        )?;

        Ok(Self {
            workflow,
            firewall_tools: Arc::new(FirewallToolbox::new(catalog, firewall_client)),
            secure_endpoint: Arc::new(secure_endpoint),
        })
    }

    #[tool(
        name = "run_incident_workflow",
        description = "Runs the automated incident response workflow for a described incident: classification, log investigation, threat assessment, then containment (endpoint isolation, firewall block, SOAR case) or escalation to an analyst. Returns the incident report and the final workflow state."
    )]
    async fn run_incident_workflow(
        &self,
        #[tool(aggr)] params: RunIncidentWorkflowParams,
    ) -> Result<CallToolResult, McpError> {
        if params.incident_description.trim().is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "incident_description must not be empty",
            )]));
        }

        tracing::info!("Running incident workflow");
        let result = self.workflow.run(&params.incident_description).await;

        let state_json = serde_json::to_string_pretty(&result.state)
            .unwrap_or_else(|e| format!("{{\"serialization_error\": \"{}\"}}", e));
        let content = vec![
            Content::text(result.report.to_string()),
            Content::text(state_json),
        ];

        match result.state.error() {
            Some(err) => {
                tracing::warn!(error = %err, "Incident workflow finished with an error");
                Ok(CallToolResult::error(content))
            }
            None => Ok(CallToolResult::success(content)),
        }
    }

    #[tool(
        name = "list_firewall_tools",
        description = "Lists the firewall management tools generated from the URL table, with their method, endpoint and filterable fields."
    )]
    async fn list_firewall_tools(
        &self,
        #[tool(aggr)] params: ListFirewallToolsParams,
    ) -> Result<CallToolResult, McpError> {
        let tools = self
            .firewall_tools
            .catalog()
            .matching(params.name_filter.as_deref());

        if tools.is_empty() {
            tracing::info!("No firewall tools matched. Returning standard message.");
            return Ok(CallToolResult::success(vec![Content::text(
                "No firewall tools found.",
            )]));
        }

        let mcp_content_items: Vec<Content> = tools
            .into_iter()
            .map(|tool| {
                let fields = if tool.supports_filtering() {
                    tool.filterable_fields.join(", ")
                } else {
                    "none".to_string()
                };
                Content::text(format!(
                    "Tool: {}\nMethod: {}\nEndpoint: {}\nFilterable fields: {}\nDescription: {}",
                    tool.name, tool.method, tool.path, fields, tool.description
                ))
            })
            .collect();

        tracing::info!(
            "Returning {} firewall tools as MCP content items",
            mcp_content_items.len()
        );
        Ok(CallToolResult::success(mcp_content_items))
    }

    #[tool(
        name = "call_firewall_tool",
        description = "Invokes a firewall management tool by name. GET tools accept an optional filter expression and query parameters; POST and PUT tools send the JSON payload; DELETE tools remove the addressed object. Returns the API response as JSON."
    )]
    async fn call_firewall_tool(
        &self,
        #[tool(aggr)] params: CallFirewallToolParams,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool_name = %params.tool_name, "Calling firewall tool");

        let invocation = ToolInvocation {
            filter_expression: params.filter_expression,
            query_params: params.query_params.unwrap_or_default(),
            payload: params.payload,
        };

        match self
            .firewall_tools
            .invoke(&params.tool_name, invocation)
            .await
        {
            Ok(value) => {
                let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => {
                let err_msg = format!("Error calling firewall tool {}: {}", params.tool_name, e);
                tracing::error!("{}", err_msg);
                Ok(CallToolResult::error(vec![Content::text(err_msg)]))
            }
        }
    }

    #[tool(
        name = "get_endpoint_isolation_status",
        description = "Retrieves the Secure Endpoint isolation status of a computer by connector GUID."
    )]
    async fn get_endpoint_isolation_status(
        &self,
        #[tool(aggr)] params: GetEndpointIsolationStatusParams,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(connector_guid = %params.connector_guid, "Retrieving isolation status");

        match self
            .secure_endpoint
            .isolation_status(&params.connector_guid)
            .await
        {
            Ok(data) => {
                let formatted_text = format!(
                    "Connector GUID: {}\nStatus: {}\nAvailable: {}\nComment: {}",
                    params.connector_guid,
                    data.status,
                    data.available,
                    data.comment.as_deref().unwrap_or("None")
                );
                Ok(CallToolResult::success(vec![Content::text(formatted_text)]))
            }
            Err(e) => {
                let err_msg = format!(
                    "Error retrieving isolation status for {}: {}",
                    params.connector_guid, e
                );
                tracing::error!("{}", err_msg);
                Ok(CallToolResult::error(vec![Content::text(err_msg)]))
            }
        }
    }
}

#[tool(tool_box)]
impl ServerHandler for SecOpsToolsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "This server runs automated security incident response and exposes firewall management tools.\n\
                Available tools:\n\
                - 'run_incident_workflow': Classifies, investigates and responds to an incident. Requires 'incident_description'.\n\
                - 'list_firewall_tools': Lists firewall management tools. Optionally takes 'name_filter'.\n\
                - 'call_firewall_tool': Invokes a firewall tool by 'tool_name'. Optional 'filter_expression', \
                'query_params' and 'payload'.\n\
                - 'get_endpoint_isolation_status': Secure Endpoint isolation status for a 'connector_guid'."
                    .to_string(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = SecOpsConfig::from_env()?;
    if let Some(tools_file) = args.tools_file {
        config.firewall.tools_file = tools_file;
    }

    if let Some(incident) = args.incident {
        tracing::info!("Running a single incident from the command line");
        let workflow = IncidentWorkflow::from_config(&config)?;
        let result = workflow.run(&incident).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    tracing::info!("Starting security operations MCP Server...");

    let server = SecOpsToolsServer::new(&config)?;

    tracing::info!("Using stdio transport");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("serving error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}
