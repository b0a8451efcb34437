use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::CollaboratorError;
use super::http::{build_client, expect_success, join_url};
use super::{Findings, LogSearch, SearchQuery};
use crate::config::SplunkSettings;

const SERVICE: &str = "splunk";
const RESULT_LIMIT: usize = 50;
const SUMMARY_ROWS: usize = 10;
const RAW_TEXT_LIMIT: usize = 200;

/// Runs blocking one-shot searches through the Splunk export endpoint.
#[derive(Debug, Clone)]
pub struct SplunkSearch {
    client: Client,
    endpoint: String,
    token: String,
    index: String,
    earliest_time: String,
    latest_time: String,
}

impl SplunkSearch {
    pub fn new(
        settings: &SplunkSettings,
        verify_ssl: bool,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        debug!(base_url = %settings.base_url, index = %settings.index, "Creating Splunk search client");
        Ok(Self {
            client: build_client(SERVICE, verify_ssl, timeout)?,
            endpoint: join_url(&settings.base_url, "/services/search/jobs/export"),
            token: settings.token.clone(),
            index: settings.index.clone(),
            earliest_time: settings.earliest_time.clone(),
            latest_time: settings.latest_time.clone(),
        })
    }

    pub fn build_spl(&self, query: &SearchQuery) -> String {
        build_spl(&self.index, query)
    }
}

pub fn build_spl(index: &str, query: &SearchQuery) -> String {
    let filter = if query.terms.is_empty() {
        let raw: String = query.raw_text.chars().take(RAW_TEXT_LIMIT).collect();
        format!("\"{}\"", escape(&raw))
    } else {
        let terms: Vec<String> = query
            .terms
            .iter()
            .map(|t| format!("\"{}\"", escape(t)))
            .collect();
        format!("({})", terms.join(" OR "))
    };
    format!("search index={} {} | head {}", index, filter, RESULT_LIMIT)
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Pulls the `result` objects out of a newline-delimited export body.
pub fn parse_export(body: &str) -> Result<Vec<Map<String, Value>>, CollaboratorError> {
    let mut results = Vec::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let value: Value = serde_json::from_str(line)?;
        match value.get("result") {
            Some(Value::Object(row)) => results.push(row.clone()),
            Some(other) => warn!(?other, "Ignoring non-object Splunk result"),
            None => {}
        }
    }
    Ok(results)
}

pub fn summarize(index: &str, rows: &[Map<String, Value>]) -> String {
    if rows.is_empty() {
        return "No results found.".to_string();
    }
    let mut summary = format!("{} matching events in index {}:", rows.len(), index);
    for row in rows.iter().take(SUMMARY_ROWS) {
        let fields: Vec<String> = row
            .iter()
            .filter(|(k, _)| !k.starts_with("_bkt") && !k.starts_with("_cd"))
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect();
        summary.push_str("\n- ");
        summary.push_str(&fields.join(" "));
    }
    if rows.len() > SUMMARY_ROWS {
        summary.push_str(&format!("\n... {} more", rows.len() - SUMMARY_ROWS));
    }
    summary
}

#[async_trait]
impl LogSearch for SplunkSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Findings, CollaboratorError> {
        let spl = self.build_spl(query);
        info!(search = %spl, "Running Splunk search");

        let form = [
            ("search", spl.as_str()),
            ("earliest_time", self.earliest_time.as_str()),
            ("latest_time", self.latest_time.as_str()),
            ("output_mode", "json"),
        ];
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .form(&form)
            .send()
            .await?;
        let body = expect_success(SERVICE, response).await?.text().await?;

        let rows = parse_export(&body)?;
        debug!(result_count = rows.len(), "Splunk search finished");
        Ok(Findings {
            result_count: rows.len(),
            summary: summarize(&self.index, &rows),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spl_uses_indicators_when_present() {
        let query = SearchQuery {
            terms: vec!["10.0.0.5".into(), "198.51.100.7".into()],
            raw_text: "ignored".into(),
        };
        assert_eq!(
            build_spl("firewall", &query),
            "search index=firewall (\"10.0.0.5\" OR \"198.51.100.7\") | head 50"
        );
    }

    #[test]
    fn spl_falls_back_to_escaped_text() {
        let query = SearchQuery {
            terms: vec![],
            raw_text: "user \"admin\" locked out".into(),
        };
        assert_eq!(
            build_spl("main", &query),
            "search index=main \"user \\\"admin\\\" locked out\" | head 50"
        );
    }

    #[test]
    fn export_parsing_skips_metadata_lines() {
        let body = format!(
            "{}\n{}\n\n{}\n",
            json!({"preview": false, "offset": 0, "result": {"src_ip": "10.0.0.5", "action": "allowed"}}),
            json!({"preview": false, "offset": 1, "result": {"src_ip": "10.0.0.5", "count": 3}}),
            json!({"lastrow": true})
        );
        let rows = parse_export(&body).unwrap();
        assert_eq!(rows.len(), 2);
        let summary = summarize("main", &rows);
        assert!(summary.starts_with("2 matching events in index main:"));
        assert!(summary.contains("action=allowed src_ip=10.0.0.5"));
        assert!(summary.contains("count=3"));
    }

    #[test]
    fn empty_export_reports_no_results() {
        assert!(parse_export("").unwrap().is_empty());
        assert_eq!(summarize("main", &[]), "No results found.");
    }
}
