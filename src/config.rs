//! Process configuration.
//!
//! Everything the server needs is read once, in [`SecOpsConfig::from_env`],
//! and handed to constructors explicitly. Nothing else in the crate looks at
//! the environment.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::workflow::WorkflowOptions;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoarBackend {
    SplunkSoar,
    TheHive,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct SplunkSettings {
    pub base_url: String,
    pub token: String,
    pub index: String,
    pub earliest_time: String,
    pub latest_time: String,
}

#[derive(Debug, Clone)]
pub struct SecureEndpointSettings {
    pub base_url: String,
    pub client_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct FirewallSettings {
    pub base_url: String,
    pub api_key: String,
    pub block_path: String,
    pub tools_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SoarSettings {
    pub backend: SoarBackend,
    pub base_url: String,
    pub api_token: String,
}

#[derive(Debug, Clone)]
pub struct SecOpsConfig {
    pub llm: LlmSettings,
    pub splunk: SplunkSettings,
    pub secure_endpoint: SecureEndpointSettings,
    pub firewall: FirewallSettings,
    pub soar: SoarSettings,
    pub history_path: PathBuf,
    pub workflow: WorkflowOptions,
    pub verify_ssl: bool,
}

impl SecOpsConfig {
    /// Reads the configuration from the process environment.
    /// Call `dotenv().ok()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));
        let or_default = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let llm = LlmSettings {
            base_url: or_default("LLM_BASE_URL", "https://api.anthropic.com"),
            api_key: required("ANTHROPIC_API_KEY")?,
            model: or_default("LLM_MODEL", "claude-sonnet-4-20250514"),
            max_tokens: parse_number(
                "LLM_MAX_TOKENS",
                &or_default("LLM_MAX_TOKENS", "1024"),
            )?,
        };

        let splunk = SplunkSettings {
            base_url: or_default("SPLUNK_URL", "https://localhost:8089"),
            token: required("SPLUNK_TOKEN")?,
            index: or_default("SPLUNK_INDEX", "main"),
            earliest_time: or_default("SPLUNK_EARLIEST", "-24h"),
            latest_time: or_default("SPLUNK_LATEST", "now"),
        };

        let secure_endpoint = SecureEndpointSettings {
            base_url: or_default(
                "CISCO_SECURE_ENDPOINT_BASE_URL",
                "https://api.amp.cisco.com",
            ),
            client_id: required("CISCO_SECURE_ENDPOINT_CLIENT_ID")?,
            api_key: required("CISCO_SECURE_ENDPOINT_API_KEY")?,
        };

        let firewall = FirewallSettings {
            base_url: required("FIREWALL_BASE_URL")?,
            api_key: required("FIREWALL_API_KEY")?,
            block_path: or_default("FIREWALL_BLOCK_PATH", "/v1/blocked-hosts"),
            tools_file: PathBuf::from(or_default("FIREWALL_TOOLS_FILE", "firewall_tools.json")),
        };

        let backend = match or_default("SOAR_BACKEND", "splunk").to_lowercase().as_str() {
            "splunk" | "splunk_soar" => SoarBackend::SplunkSoar,
            "thehive" => SoarBackend::TheHive,
            other => {
                return Err(ConfigError::Invalid {
                    name: "SOAR_BACKEND",
                    value: other.to_string(),
                })
            }
        };
        let soar = SoarSettings {
            backend,
            base_url: required("SOAR_URL")?,
            api_token: required("SOAR_API_TOKEN")?,
        };

        let timeout_secs: u64 = parse_number(
            "WORKFLOW_CALL_TIMEOUT_SECS",
            &or_default("WORKFLOW_CALL_TIMEOUT_SECS", "30"),
        )?;
        let workflow = WorkflowOptions {
            call_timeout: Duration::from_secs(timeout_secs),
            auto_contain_high_threats: parse_flag(
                "AUTO_CONTAIN_HIGH_THREATS",
                &or_default("AUTO_CONTAIN_HIGH_THREATS", "true"),
            )?,
        };

        Ok(Self {
            llm,
            splunk,
            secure_endpoint,
            firewall,
            soar,
            history_path: PathBuf::from(or_default("HISTORY_PATH", "incident_history.jsonl")),
            workflow,
            verify_ssl: parse_flag("VERIFY_SSL", &or_default("VERIFY_SSL", "false"))?,
        })
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_env() -> HashMap<String, String> {
        [
            ("ANTHROPIC_API_KEY", "llm-key"),
            ("SPLUNK_TOKEN", "splunk-token"),
            ("CISCO_SECURE_ENDPOINT_CLIENT_ID", "client"),
            ("CISCO_SECURE_ENDPOINT_API_KEY", "amp-key"),
            ("FIREWALL_BASE_URL", "https://fmc.example.com"),
            ("FIREWALL_API_KEY", "fw-key"),
            ("SOAR_URL", "https://soar.example.com"),
            ("SOAR_API_TOKEN", "soar-token"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn defaults_fill_optional_settings() {
        let config = SecOpsConfig::from_map(&minimal_env()).unwrap();
        assert_eq!(config.llm.base_url, "https://api.anthropic.com");
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.splunk.index, "main");
        assert_eq!(config.splunk.earliest_time, "-24h");
        assert_eq!(config.soar.backend, SoarBackend::SplunkSoar);
        assert_eq!(config.firewall.block_path, "/v1/blocked-hosts");
        assert_eq!(config.workflow.call_timeout, Duration::from_secs(30));
        assert!(config.workflow.auto_contain_high_threats);
        assert!(!config.verify_ssl);
    }

    #[test]
    fn missing_required_variable_is_reported_by_name() {
        let mut vars = minimal_env();
        vars.remove("SPLUNK_TOKEN");
        let err = SecOpsConfig::from_map(&vars).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SPLUNK_TOKEN"));
        assert_eq!(
            err.to_string(),
            "SPLUNK_TOKEN environment variable is required"
        );
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut vars = minimal_env();
        vars.insert("FIREWALL_API_KEY".into(), "   ".into());
        assert_eq!(
            SecOpsConfig::from_map(&vars).unwrap_err(),
            ConfigError::Missing("FIREWALL_API_KEY")
        );
    }

    #[test]
    fn explicit_values_override_defaults() {
        let mut vars = minimal_env();
        vars.insert("SOAR_BACKEND".into(), "TheHive".into());
        vars.insert("WORKFLOW_CALL_TIMEOUT_SECS".into(), "5".into());
        vars.insert("AUTO_CONTAIN_HIGH_THREATS".into(), "false".into());
        vars.insert("VERIFY_SSL".into(), "TRUE".into());
        let config = SecOpsConfig::from_map(&vars).unwrap();
        assert_eq!(config.soar.backend, SoarBackend::TheHive);
        assert_eq!(config.workflow.call_timeout, Duration::from_secs(5));
        assert!(!config.workflow.auto_contain_high_threats);
        assert!(config.verify_ssl);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut vars = minimal_env();
        vars.insert("WORKFLOW_CALL_TIMEOUT_SECS".into(), "soon".into());
        assert!(matches!(
            SecOpsConfig::from_map(&vars),
            Err(ConfigError::Invalid {
                name: "WORKFLOW_CALL_TIMEOUT_SECS",
                ..
            })
        ));

        let mut vars = minimal_env();
        vars.insert("SOAR_BACKEND".into(), "jira".into());
        assert!(matches!(
            SecOpsConfig::from_map(&vars),
            Err(ConfigError::Invalid {
                name: "SOAR_BACKEND",
                ..
            })
        ));

        let mut vars = minimal_env();
        vars.insert("AUTO_CONTAIN_HIGH_THREATS".into(), "ture".into());
        assert_eq!(
            SecOpsConfig::from_map(&vars).unwrap_err(),
            ConfigError::Invalid {
                name: "AUTO_CONTAIN_HIGH_THREATS",
                value: "ture".to_string(),
            }
        );
    }

    #[test]
    fn flags_accept_common_spellings() {
        for (raw, expected) in [("1", true), ("Yes", true), ("on", true), ("0", false), ("NO", false)] {
            let mut vars = minimal_env();
            vars.insert("AUTO_CONTAIN_HIGH_THREATS".into(), raw.into());
            let config = SecOpsConfig::from_map(&vars).unwrap();
            assert_eq!(config.workflow.auto_contain_high_threats, expected, "{}", raw);
        }
    }
}
