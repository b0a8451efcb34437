//! Prompts sent to the model and the line-oriented parsers for its replies.

use super::error::CollaboratorError;
use super::{Classification, ThreatAssessment};
use crate::workflow::state::RiskLevel;

const SERVICE: &str = "llm";

pub fn classification_prompt(incident: &str) -> String {
    format!(
        "Analyze this security incident and classify it:\n\
         \n\
         Incident: {}\n\
         \n\
         Provide:\n\
         1. Severity level (Low/Medium/High/Critical)\n\
         2. Whether it requires automated investigation (Yes/No)\n\
         3. Brief classification reasoning\n\
         \n\
         Format your response as:\n\
         SEVERITY: [level]\n\
         INVESTIGATE: [Yes/No]\n\
         REASONING: [brief explanation]",
        incident
    )
}

pub fn assessment_prompt(
    incident: &str,
    severity: Option<RiskLevel>,
    findings: Option<&str>,
) -> String {
    format!(
        "Based on this security analysis, determine the threat level:\n\
         \n\
         Incident: {}\n\
         Severity: {}\n\
         Investigation: {}\n\
         \n\
         Determine:\n\
         - Threat Level (Low/Medium/High/Critical)\n\
         - Response Type (Automated/Manual)\n\
         - Recommended Actions\n\
         \n\
         Format:\n\
         THREAT_LEVEL: [level]\n\
         RESPONSE: [Automated/Manual]\n\
         ACTIONS: [comma-separated list]",
        incident,
        severity.map(|s| s.as_str()).unwrap_or("Unknown"),
        findings.unwrap_or("No investigation findings available.")
    )
}

/// Returns the text after `KEY:` on the first line that starts with that key.
/// Matching ignores case, list markers and markdown emphasis around the key.
fn field<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let line = line
            .trim_start()
            .trim_start_matches(|c: char| c == '*' || c == '-' || c == '#')
            .trim_start();
        let head = line.get(..key.len())?;
        if !head.eq_ignore_ascii_case(key) {
            return None;
        }
        line[key.len()..]
            .trim_start_matches('*')
            .strip_prefix(':')
            .map(|value| value.trim().trim_start_matches('*').trim())
    })
}

pub fn parse_classification(text: &str) -> Result<Classification, CollaboratorError> {
    let severity_label = field(text, "SEVERITY")
        .filter(|label| !label.is_empty())
        .ok_or_else(|| CollaboratorError::ParseError {
            service: SERVICE,
            reason: "classification reply has no SEVERITY line".to_string(),
        })?;

    // An absent flag means the model did not rule investigation out.
    let requires_investigation = field(text, "INVESTIGATE")
        .map(|flag| flag.to_ascii_lowercase().contains("yes"))
        .unwrap_or(true);

    let reasoning = field(text, "REASONING")
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok(Classification {
        severity_label: severity_label.to_string(),
        requires_investigation,
        reasoning,
    })
}

pub fn parse_assessment(text: &str) -> Result<ThreatAssessment, CollaboratorError> {
    let threat_label = field(text, "THREAT_LEVEL")
        .filter(|label| !label.is_empty())
        .ok_or_else(|| CollaboratorError::ParseError {
            service: SERVICE,
            reason: "assessment reply has no THREAT_LEVEL line".to_string(),
        })?;

    let automated_response = field(text, "RESPONSE").and_then(|r| {
        let r = r.to_ascii_lowercase();
        if r.contains("automated") {
            Some(true)
        } else if r.contains("manual") {
            Some(false)
        } else {
            None
        }
    });

    let recommended_actions = field(text, "ACTIONS")
        .map(|actions| {
            actions
                .split(',')
                .map(|a| a.trim().trim_matches(|c: char| c == '[' || c == ']').trim())
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ThreatAssessment {
        threat_label: threat_label.to_string(),
        automated_response,
        recommended_actions,
    })
}
