use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::FirewallManagerClient;
use crate::collaborators::error::CollaboratorError;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("valid placeholder regex"));

/// A single path segment. Separators, query and fragment markers are not allowed.
static PATH_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.~:@\-]{1,256}$").expect("valid path segment regex"));

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read tool file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tool file is not a valid JSON URL table: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unknown firewall tool '{0}'")]
    UnknownTool(String),

    #[error("Tool '{tool}' needs a value for path parameter '{parameter}'")]
    MissingPathParameter { tool: String, parameter: String },

    #[error("Invalid value '{value}' for path parameter '{parameter}' of tool '{tool}'")]
    InvalidPathParameter {
        tool: String,
        parameter: String,
        value: String,
    },

    #[error("Firewall API error: {0}")]
    Api(#[from] CollaboratorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    fn parse(method: &str) -> Option<Self> {
        match method.trim().to_ascii_uppercase().as_str() {
            "" | "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// One row of the URL table as it appears on disk.
#[derive(Debug, Clone, Deserialize)]
struct UrlEntry {
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "URL", default)]
    url: Option<String>,
    #[serde(rename = "Method", default)]
    method: Option<String>,
    #[serde(rename = "FilterableFields", default)]
    filterable_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirewallTool {
    pub name: String,
    pub display_name: String,
    pub path: String,
    pub method: HttpMethod,
    pub filterable_fields: Vec<String>,
    pub description: String,
}

impl FirewallTool {
    pub fn supports_filtering(&self) -> bool {
        !self.filterable_fields.is_empty()
    }

    pub fn path_parameters(&self) -> Vec<String> {
        PLACEHOLDER
            .captures_iter(&self.path)
            .map(|c| c[1].to_string())
            .collect()
    }
}

/// `"Identity Groups"` becomes `"identity_groups"`.
pub fn sanitize_tool_name(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}

pub fn tool_description(
    name: &str,
    path: &str,
    method: HttpMethod,
    filterable_fields: &[String],
) -> String {
    let mut description = match method {
        HttpMethod::Get => format!(
            "Fetch data for {} from the firewall manager (Endpoint: {}).",
            name, path
        ),
        HttpMethod::Post | HttpMethod::Put => format!(
            "Send config changes to {} on the firewall manager (Endpoint: {}).",
            name, path
        ),
        HttpMethod::Delete => format!(
            "Delete {} on the firewall manager (Endpoint: {}).",
            name, path
        ),
    };
    if filterable_fields.is_empty() {
        description.push_str(" Does not support filtering.");
    } else {
        description.push_str(&format!(
            " Supports filtering on fields: {}.",
            filterable_fields.join(", ")
        ));
    }
    description
}

/// Tools generated from a JSON table of firewall API URLs.
#[derive(Debug, Clone, Default)]
pub struct FirewallToolCatalog {
    tools: Vec<FirewallTool>,
}

impl FirewallToolCatalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<UrlEntry> = serde_json::from_str(json)?;
        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(entries.len());

        for entry in entries {
            let (display_name, path) = match (&entry.name, &entry.url) {
                (Some(name), Some(url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
                    (name.trim().to_string(), url.trim().to_string())
                }
                _ => {
                    warn!(?entry, "Skipping entry due to missing 'Name' or 'URL'");
                    continue;
                }
            };
            let raw_method = entry.method.as_deref().unwrap_or("GET");
            let Some(method) = HttpMethod::parse(raw_method) else {
                warn!(name = %display_name, method = raw_method, "Skipping entry with unsupported method");
                continue;
            };
            let name = sanitize_tool_name(&display_name);
            if !seen.insert(name.clone()) {
                warn!(%name, "Skipping duplicate tool name");
                continue;
            }
            let description =
                tool_description(&display_name, &path, method, &entry.filterable_fields);
            tools.push(FirewallTool {
                name,
                display_name,
                path,
                method,
                filterable_fields: entry.filterable_fields,
                description,
            });
        }

        info!(count = tools.len(), "Firewall tool catalog built");
        Ok(Self { tools })
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        debug!(path = %path.display(), "Loading firewall tool table");
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn tools(&self) -> &[FirewallTool] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&FirewallTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Tools whose name contains `fragment`, case-insensitively.
    pub fn matching(&self, fragment: Option<&str>) -> Vec<&FirewallTool> {
        let fragment = fragment.map(|f| f.trim().to_lowercase()).unwrap_or_default();
        self.tools
            .iter()
            .filter(|t| fragment.is_empty() || t.name.contains(&fragment))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Arguments for one tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolInvocation {
    pub filter_expression: Option<String>,
    pub query_params: HashMap<String, String>,
    pub payload: Option<Value>,
}

/// A resolved HTTP request for a catalog tool.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub method: HttpMethod,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

pub fn prepare_call(
    tool: &FirewallTool,
    invocation: ToolInvocation,
) -> Result<PreparedCall, CatalogError> {
    let mut query_params = invocation.query_params;

    let mut segments = HashMap::new();
    for parameter in tool.path_parameters() {
        if segments.contains_key(&parameter) {
            continue;
        }
        let value = query_params
            .remove(&parameter)
            .ok_or_else(|| CatalogError::MissingPathParameter {
                tool: tool.name.clone(),
                parameter: parameter.clone(),
            })?;
        if !PATH_SEGMENT.is_match(&value) || value.contains("..") {
            return Err(CatalogError::InvalidPathParameter {
                tool: tool.name.clone(),
                parameter,
                value,
            });
        }
        segments.insert(parameter, value);
    }
    // One pass over the template, so substituted values are never rescanned.
    let path = PLACEHOLDER
        .replace_all(&tool.path, |caps: &regex::Captures| segments[&caps[1]].clone())
        .into_owned();

    let mut params: Vec<(String, String)> = query_params.into_iter().collect();
    params.sort();
    if let Some(filter) = invocation.filter_expression.filter(|f| !f.trim().is_empty()) {
        params.insert(0, ("filter".to_string(), filter));
    }

    let body = match tool.method {
        HttpMethod::Post | HttpMethod::Put => Some(invocation.payload.unwrap_or_else(|| json!({}))),
        HttpMethod::Get | HttpMethod::Delete => None,
    };

    Ok(PreparedCall {
        method: tool.method,
        path,
        params,
        body,
    })
}

/// The catalog bound to a live API client.
#[derive(Debug, Clone)]
pub struct FirewallToolbox {
    catalog: FirewallToolCatalog,
    client: FirewallManagerClient,
}

impl FirewallToolbox {
    pub fn new(catalog: FirewallToolCatalog, client: FirewallManagerClient) -> Self {
        Self { catalog, client }
    }

    pub fn catalog(&self) -> &FirewallToolCatalog {
        &self.catalog
    }

    pub async fn invoke(
        &self,
        tool_name: &str,
        invocation: ToolInvocation,
    ) -> Result<Value, CatalogError> {
        let tool = self
            .catalog
            .get(tool_name)
            .ok_or_else(|| CatalogError::UnknownTool(tool_name.to_string()))?;
        let call = prepare_call(tool, invocation)?;
        info!(tool = %tool.name, method = %call.method, path = %call.path, "Invoking firewall tool");

        let result = match (call.method, call.body) {
            (HttpMethod::Get, _) => self.client.get(&call.path, &call.params).await?,
            (HttpMethod::Delete, _) => self.client.delete(&call.path, &call.params).await?,
            (HttpMethod::Post, body) => {
                self.client
                    .post(&call.path, &body.unwrap_or_else(|| json!({})))
                    .await?
            }
            (HttpMethod::Put, body) => {
                self.client
                    .put(&call.path, &body.unwrap_or_else(|| json!({})))
                    .await?
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"[
        {"Name": "List Devices", "URL": "/v1/inventory/devices", "Method": "GET", "FilterableFields": ["name", "deviceType"]},
        {"Name": "Network Objects", "URL": "/v1/domain/{domainUUID}/object/networks", "Method": "POST"},
        {"Name": "Access Policies", "URL": "/v1/domain/{domainUUID}/policy/accesspolicies"},
        {"Name": "", "URL": "/v1/ignored"},
        {"Name": "No Url"},
        {"Name": "list devices", "URL": "/v1/duplicate"},
        {"Name": "Patch Thing", "URL": "/v1/thing", "Method": "PATCH"}
    ]"#;

    #[test]
    fn builds_tools_and_skips_bad_entries() {
        let catalog = FirewallToolCatalog::from_json(TABLE).unwrap();
        let names: Vec<&str> = catalog.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["list_devices", "network_objects", "access_policies"]);
        assert_eq!(catalog.get("access_policies").unwrap().method, HttpMethod::Get);
        assert_eq!(catalog.get("list_devices").unwrap().path, "/v1/inventory/devices");
    }

    #[test]
    fn descriptions_follow_method_and_filtering() {
        let catalog = FirewallToolCatalog::from_json(TABLE).unwrap();
        assert_eq!(
            catalog.get("list_devices").unwrap().description,
            "Fetch data for List Devices from the firewall manager (Endpoint: /v1/inventory/devices). \
             Supports filtering on fields: name, deviceType."
        );
        assert_eq!(
            catalog.get("network_objects").unwrap().description,
            "Send config changes to Network Objects on the firewall manager \
             (Endpoint: /v1/domain/{domainUUID}/object/networks). Does not support filtering."
        );
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_tool_name("Identity Groups"), "identity_groups");
        assert_eq!(sanitize_tool_name(" Devices "), "devices");
    }

    #[test]
    fn matching_filters_by_fragment() {
        let catalog = FirewallToolCatalog::from_json(TABLE).unwrap();
        assert_eq!(catalog.matching(None).len(), 3);
        assert_eq!(catalog.matching(Some("POLICIES")).len(), 1);
        assert!(catalog.matching(Some("nat")).is_empty());
    }

    #[test]
    fn prepare_fills_path_parameters_and_keeps_the_rest_as_query() {
        let catalog = FirewallToolCatalog::from_json(TABLE).unwrap();
        let tool = catalog.get("access_policies").unwrap();
        let mut query_params = HashMap::new();
        query_params.insert("domainUUID".to_string(), "abc-123".to_string());
        query_params.insert("limit".to_string(), "25".to_string());

        let call = prepare_call(
            tool,
            ToolInvocation {
                filter_expression: Some("name:Default".into()),
                query_params,
                payload: None,
            },
        )
        .unwrap();
        assert_eq!(call.path, "/v1/domain/abc-123/policy/accesspolicies");
        assert_eq!(
            call.params,
            vec![
                ("filter".to_string(), "name:Default".to_string()),
                ("limit".to_string(), "25".to_string())
            ]
        );
        assert_eq!(call.body, None);
    }

    #[test]
    fn prepare_requires_every_path_parameter() {
        let catalog = FirewallToolCatalog::from_json(TABLE).unwrap();
        let tool = catalog.get("network_objects").unwrap();
        let err = prepare_call(tool, ToolInvocation::default()).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::MissingPathParameter { ref parameter, .. } if parameter == "domainUUID"
        ));
    }

    #[test]
    fn prepare_rejects_path_values_that_leave_the_template() {
        let catalog = FirewallToolCatalog::from_json(TABLE).unwrap();
        let tool = catalog.get("access_policies").unwrap();

        for value in ["../../admin/users?x=", "a/b", "abc#frag", "..", "", "x%2Fy"] {
            let mut query_params = HashMap::new();
            query_params.insert("domainUUID".to_string(), value.to_string());
            let err = prepare_call(
                tool,
                ToolInvocation {
                    query_params,
                    ..Default::default()
                },
            )
            .unwrap_err();
            assert!(
                matches!(err, CatalogError::InvalidPathParameter { ref parameter, .. } if parameter == "domainUUID"),
                "{:?} was accepted",
                value
            );
        }
    }

    #[test]
    fn placeholder_text_in_a_value_is_rejected() {
        let tool = FirewallTool {
            name: "delete_object".to_string(),
            display_name: "Delete Object".to_string(),
            path: "/v1/domain/{domainUUID}/object/{objectId}".to_string(),
            method: HttpMethod::Delete,
            filterable_fields: Vec::new(),
            description: String::new(),
        };
        let mut query_params = HashMap::new();
        query_params.insert("domainUUID".to_string(), "{objectId}".to_string());
        query_params.insert("objectId".to_string(), "obj-1".to_string());

        let err = prepare_call(
            &tool,
            ToolInvocation {
                query_params,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidPathParameter { .. }));
    }

    #[test]
    fn post_calls_default_to_an_empty_object_body() {
        let catalog = FirewallToolCatalog::from_json(TABLE).unwrap();
        let tool = catalog.get("network_objects").unwrap();
        let mut query_params = HashMap::new();
        query_params.insert("domainUUID".to_string(), "d1".to_string());
        let call = prepare_call(
            tool,
            ToolInvocation {
                query_params,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(call.body, Some(json!({})));
        assert!(call.params.is_empty());
    }

    #[test]
    fn invalid_json_is_reported() {
        assert!(matches!(
            FirewallToolCatalog::from_json("{not json"),
            Err(CatalogError::JsonError(_))
        ));
    }
}
