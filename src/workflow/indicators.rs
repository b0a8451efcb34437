use once_cell::sync::Lazy;
use regex::Regex;

static IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b")
        .expect("valid IPv4 regex")
});

static CONNECTOR_GUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b")
        .expect("valid GUID regex")
});

/// Mitigation targets found in incident text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indicators {
    pub ip: Option<String>,
    pub connector_guid: Option<String>,
}

impl Indicators {
    /// Scans `texts` in order and keeps the first match of each kind.
    pub fn extract<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut found = Indicators::default();
        for text in texts {
            if found.ip.is_none() {
                found.ip = IPV4.find(text).map(|m| m.as_str().to_string());
            }
            if found.connector_guid.is_none() {
                found.connector_guid = CONNECTOR_GUID
                    .find(text)
                    .map(|m| m.as_str().to_ascii_lowercase());
            }
        }
        found
    }

    /// The endpoint to isolate: the connector GUID when known, else the IP.
    pub fn endpoint_target(&self) -> Option<&str> {
        self.connector_guid.as_deref().or(self.ip.as_deref())
    }

    pub fn block_target(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn search_terms(&self) -> Vec<String> {
        self.ip
            .iter()
            .chain(self.connector_guid.iter())
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ip.is_none() && self.connector_guid.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_ip_wins() {
        let found = Indicators::extract(["Beacon from 10.1.2.3 to 203.0.113.9 observed"]);
        assert_eq!(found.ip.as_deref(), Some("10.1.2.3"));
        assert_eq!(found.endpoint_target(), Some("10.1.2.3"));
        assert_eq!(found.search_terms(), vec!["10.1.2.3".to_string()]);
    }

    #[test]
    fn out_of_range_octets_are_not_addresses() {
        let found = Indicators::extract(["build 999.1.1.1 failed"]);
        assert!(found.ip.is_none());
        assert!(found.is_empty());
    }

    #[test]
    fn guid_is_preferred_for_isolation_and_later_texts_are_searched() {
        let found = Indicators::extract([
            "Malware on host 0E334B24-A9E7-F3DB-4197-4EB0057721BF",
            "Outbound traffic to 198.51.100.7",
        ]);
        assert_eq!(
            found.endpoint_target(),
            Some("0e334b24-a9e7-f3db-4197-4eb0057721bf")
        );
        assert_eq!(found.block_target(), Some("198.51.100.7"));
    }

    #[test]
    fn nothing_found() {
        let found = Indicators::extract(["Minor login anomaly detected for user john.doe"]);
        assert_eq!(found, Indicators::default());
        assert!(found.endpoint_target().is_none());
    }
}
