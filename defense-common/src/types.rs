use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptor carried between components for a single inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub source_ip: IpAddr,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    pub method: String,
    pub path: String,
    pub query: String,
    pub timestamp_utc: DateTime<Utc>,
}

impl RequestMetadata {
    /// Look up a header case-insensitively, matching HTTP semantics.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_ascii_lowercase() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Why a request was flagged, ordered low to high for alert suppression.
///
/// Matches the order given in the configuration example:
/// `Frequency < Heuristic < Model < Reputation < LLM < HopLimit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Frequency,
    Heuristic,
    Model,
    Reputation,
    Llm,
    HopLimit,
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "frequency" => Ok(Severity::Frequency),
            "heuristic" => Ok(Severity::Heuristic),
            "model" => Ok(Severity::Model),
            "reputation" => Ok(Severity::Reputation),
            "llm" => Ok(Severity::Llm),
            "hop_limit" | "hoplimit" => Ok(Severity::HopLimit),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Benign,
    Suspicious,
    Malicious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Heuristic,
    Model,
    Reputation,
    Llm,
    HopLimit,
}

impl Trigger {
    pub fn severity(self) -> Severity {
        match self {
            Trigger::Heuristic => Severity::Heuristic,
            Trigger::Model => Severity::Model,
            Trigger::Reputation => Severity::Reputation,
            Trigger::Llm => Severity::Llm,
            Trigger::HopLimit => Severity::HopLimit,
        }
    }
}

/// Result of the C4 scoring pipeline for a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationDecision {
    pub source_ip: IpAddr,
    pub score: f64,
    pub reasons: Vec<String>,
    pub classification: Classification,
    pub trigger: Option<Trigger>,
    /// Present only when the captcha band is configured and tripped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_url: Option<String>,
}

impl EscalationDecision {
    /// Highest-severity reason recorded for this decision, used for alert
    /// suppression in C5. Falls back to `Frequency` when no trigger fired
    /// (e.g. a benign/suspicious decision that still carries reasons).
    pub fn highest_severity(&self) -> Severity {
        self.trigger
            .map(Trigger::severity)
            .unwrap_or(Severity::Frequency)
    }
}

/// Payload posted by C4 (or C3's hop-overflow path) to C5's `/analyze` webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementRequest {
    pub decision: EscalationDecision,
    pub metadata: RequestMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_metadata() -> RequestMetadata {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), "curl/8.0".to_string());
        RequestMetadata {
            source_ip: "203.0.113.7".parse().unwrap(),
            user_agent: "curl/8.0".to_string(),
            headers,
            method: "GET".to_string(),
            path: "/x".to_string(),
            query: "".to_string(),
            timestamp_utc: Utc::now(),
        }
    }

    #[test]
    fn test_request_metadata_roundtrip() {
        let meta = sample_metadata();
        let json = serde_json::to_string(&meta).unwrap();
        let back: RequestMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let meta = sample_metadata();
        assert_eq!(meta.header("user-agent"), Some("curl/8.0"));
        assert_eq!(meta.header("USER-AGENT"), Some("curl/8.0"));
        assert_eq!(meta.header("accept-language"), None);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Frequency < Severity::Heuristic);
        assert!(Severity::Heuristic < Severity::Model);
        assert!(Severity::Model < Severity::Reputation);
        assert!(Severity::Reputation < Severity::Llm);
        assert!(Severity::Llm < Severity::HopLimit);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!(Severity::from_str("Heuristic").unwrap(), Severity::Heuristic);
        assert_eq!(Severity::from_str("hop_limit").unwrap(), Severity::HopLimit);
        assert!(Severity::from_str("bogus").is_err());
    }

    #[test]
    fn test_decision_roundtrip() {
        let decision = EscalationDecision {
            source_ip: "203.0.113.7".parse().unwrap(),
            score: 0.83,
            reasons: vec!["heuristic".to_string(), "frequency".to_string()],
            classification: Classification::Malicious,
            trigger: Some(Trigger::Model),
            captcha_url: None,
        };
        let json = serde_json::to_string(&decision).unwrap();
        let back: EscalationDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, back);
        assert_eq!(back.highest_severity(), Severity::Model);
    }
}
