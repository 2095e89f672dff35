//! Layered configuration shared by every component: built-in defaults, an
//! optional file, then `DEFENSE_*` environment variables, composed with
//! the `config` crate exactly as the wider defense configuration blob is
//! loaded once at startup (hot-reload is not required, per the resource
//! model).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Severity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateStoreSettings {
    pub state_store_url: String,
    pub state_store_timeout_ms: u64,
}

impl Default for StateStoreSettings {
    fn default() -> Self {
        Self {
            state_store_url: "redis://127.0.0.1:6379".to_string(),
            state_store_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeFilterSettings {
    pub known_bad_ua_substrings: Vec<String>,
    pub known_benign_crawler_uas: Vec<String>,
    pub check_empty_ua: bool,
    pub check_missing_accept_language: bool,
    pub check_generic_accept: bool,
    pub blocklist_ttl_seconds: u64,
    pub tarpit_rewrite_path: String,
    pub tarpit_upstream_url: String,
    pub tarpit_upstream_timeout_ms: u64,
}

impl Default for EdgeFilterSettings {
    fn default() -> Self {
        Self {
            known_bad_ua_substrings: vec![
                "gptbot".into(),
                "ccbot".into(),
                "bytespider".into(),
                "python-requests".into(),
                "curl".into(),
                "wget".into(),
                "masscan".into(),
                "sqlmap".into(),
            ],
            known_benign_crawler_uas: vec!["googlebot".into(), "bingbot".into()],
            check_empty_ua: true,
            check_missing_accept_language: true,
            check_generic_accept: true,
            blocklist_ttl_seconds: 86_400,
            tarpit_rewrite_path: "/anti-scrape-tarpit/".to_string(),
            tarpit_upstream_url: "http://127.0.0.1:8083".to_string(),
            tarpit_upstream_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TarpitSettings {
    pub system_seed: String,
    pub min_delay_sec: f64,
    pub max_delay_sec: f64,
    pub max_hops: i64,
    pub hop_window_seconds: u64,
    pub tarpit_flag_ttl_seconds: u64,
    pub markov_database_url: String,
    pub escalation_post_url: String,
    pub escalation_post_timeout_ms: u64,
    pub enforcement_webhook_url: String,
    pub enforcement_webhook_timeout_ms: u64,
    pub max_global_connections: usize,
    pub max_connections_per_ip: usize,
    pub min_paragraphs: u32,
    pub max_paragraphs: u32,
    pub min_paragraph_tokens: u32,
    pub max_paragraph_tokens: u32,
}

impl Default for TarpitSettings {
    fn default() -> Self {
        Self {
            system_seed: "change-me-in-production".to_string(),
            min_delay_sec: 0.6,
            max_delay_sec: 1.2,
            max_hops: 250,
            hop_window_seconds: 86_400,
            tarpit_flag_ttl_seconds: 300,
            markov_database_url: "postgres://localhost/defense_markov".to_string(),
            escalation_post_url: "http://127.0.0.1:8084/escalate".to_string(),
            escalation_post_timeout_ms: 5_000,
            enforcement_webhook_url: "http://127.0.0.1:8085/analyze".to_string(),
            enforcement_webhook_timeout_ms: 2_000,
            max_global_connections: 512,
            max_connections_per_ip: 4,
            min_paragraphs: 3,
            max_paragraphs: 10,
            min_paragraph_tokens: 40,
            max_paragraph_tokens: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationSettings {
    pub frequency_window_sec: u64,
    pub n_sat: f64,
    pub t_low: f64,
    pub t_high: f64,
    pub known_bad_uas: Vec<String>,
    pub known_benign_uas: Vec<String>,
    pub heuristic_bad_ua_bonus: f64,
    pub model_artifact_path: Option<String>,
    pub classifier_weight: f64,
    pub enable_ip_reputation: bool,
    pub ip_reputation_api_url: Option<String>,
    pub ip_reputation_api_key_file: Option<String>,
    pub ip_reputation_timeout_ms: u64,
    pub ip_reputation_malicious_score_bonus: f64,
    pub ip_reputation_min_malicious_threshold: f64,
    pub enable_llm_classification: bool,
    pub llm_api_url: Option<String>,
    pub llm_bearer_token_file: Option<String>,
    pub llm_timeout_sec: u64,
    pub captcha_score_threshold_low: f64,
    pub captcha_score_threshold_high: f64,
    pub captcha_verification_url: Option<String>,
    pub enable_captcha_trigger: bool,
    pub enforcement_webhook_url: String,
    pub enforcement_webhook_timeout_ms: u64,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            frequency_window_sec: 300,
            n_sat: 60.0,
            t_low: 0.2,
            t_high: 0.5,
            known_bad_uas: vec![
                "python-requests".into(),
                "gptbot".into(),
                "bytespider".into(),
                "scrapy".into(),
            ],
            known_benign_uas: vec!["googlebot".into(), "bingbot".into()],
            heuristic_bad_ua_bonus: 0.5,
            model_artifact_path: None,
            classifier_weight: 0.6,
            enable_ip_reputation: false,
            ip_reputation_api_url: None,
            ip_reputation_api_key_file: None,
            ip_reputation_timeout_ms: 10_000,
            ip_reputation_malicious_score_bonus: 0.3,
            ip_reputation_min_malicious_threshold: 0.7,
            enable_llm_classification: false,
            llm_api_url: None,
            llm_bearer_token_file: None,
            llm_timeout_sec: 10,
            captcha_score_threshold_low: 0.3,
            captcha_score_threshold_high: 0.45,
            captcha_verification_url: None,
            enable_captcha_trigger: false,
            enforcement_webhook_url: "http://127.0.0.1:8085/analyze".to_string(),
            enforcement_webhook_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementSettings {
    pub blocklist_ttl_seconds: u64,
    pub alert_method: AlertMethod,
    pub alert_min_reason_severity: Severity,
    pub alert_webhook_url: Option<String>,
    pub alert_slack_webhook_url: Option<String>,
    pub alert_smtp_host: Option<String>,
    pub alert_smtp_port: u16,
    pub alert_smtp_use_tls: bool,
    pub alert_smtp_username_file: Option<String>,
    pub alert_smtp_password_file: Option<String>,
    pub alert_email_to: Option<String>,
    pub alert_email_from: Option<String>,
    pub enable_community_reporting: bool,
    pub community_blocklist_report_url: Option<String>,
    pub community_blocklist_api_key_file: Option<String>,
    pub community_blocklist_report_timeout_sec: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMethod {
    None,
    Webhook,
    Slack,
    Smtp,
}

impl Default for EnforcementSettings {
    fn default() -> Self {
        Self {
            blocklist_ttl_seconds: 86_400,
            alert_method: AlertMethod::None,
            alert_min_reason_severity: Severity::Heuristic,
            alert_webhook_url: None,
            alert_slack_webhook_url: None,
            alert_smtp_host: None,
            alert_smtp_port: 587,
            alert_smtp_use_tls: true,
            alert_smtp_username_file: None,
            alert_smtp_password_file: None,
            alert_email_to: None,
            alert_email_from: None,
            enable_community_reporting: false,
            community_blocklist_report_url: None,
            community_blocklist_api_key_file: None,
            community_blocklist_report_timeout_sec: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen_addr: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Full configuration blob; each binary reads only the sections it needs
/// but all four deserialize the same shape so one file/env layer can
/// configure the whole deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefenseConfig {
    pub listen_addr: String,
    pub state_store: StateStoreSettings,
    pub edge_filter: EdgeFilterSettings,
    pub tarpit: TarpitSettings,
    pub escalation: EscalationSettings,
    pub enforcement: EnforcementSettings,
    pub metrics: MetricsSettings,
}

impl DefenseConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(Self::defaults_source()?)
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("DEFENSE").separator("__"));
        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    fn defaults_source() -> Result<config::File<config::FileSourceString, config::FileFormat>> {
        let defaults = serde_json::to_string(&DefenseConfig::default())?;
        Ok(config::File::from_str(&defaults, config::FileFormat::Json))
    }

    pub fn validate(&self) -> Result<()> {
        use crate::error::DefenseError;

        if self.listen_addr.is_empty() {
            return Err(DefenseError::Config("listen_addr must not be empty".into()));
        }
        if !self.edge_filter.tarpit_rewrite_path.ends_with('/') {
            return Err(DefenseError::Config(
                "tarpit_rewrite_path must end with '/'".into(),
            ));
        }
        if self.tarpit.min_delay_sec > self.tarpit.max_delay_sec {
            return Err(DefenseError::Config(
                "min_delay_sec must not exceed max_delay_sec".into(),
            ));
        }
        if self.escalation.t_low > self.escalation.t_high {
            return Err(DefenseError::Config("t_low must not exceed t_high".into()));
        }
        if self.enforcement.alert_method == AlertMethod::Smtp
            && (self.enforcement.alert_smtp_host.is_none() || self.enforcement.alert_email_to.is_none())
        {
            return Err(DefenseError::Config(
                "smtp alert method requires alert_smtp_host and alert_email_to".into(),
            ));
        }
        Ok(())
    }
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            state_store: StateStoreSettings::default(),
            edge_filter: EdgeFilterSettings::default(),
            tarpit: TarpitSettings::default(),
            escalation: EscalationSettings::default(),
            enforcement: EnforcementSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let cfg = DefenseConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rewrite_path_without_trailing_slash_rejected() {
        let mut cfg = DefenseConfig::default();
        cfg.edge_filter.tarpit_rewrite_path = "/no-slash".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_smtp_requires_host_and_recipient() {
        let mut cfg = DefenseConfig::default();
        cfg.enforcement.alert_method = AlertMethod::Smtp;
        assert!(cfg.validate().is_err());
        cfg.enforcement.alert_smtp_host = Some("smtp.example.com".to_string());
        cfg.enforcement.alert_email_to = Some("ops@example.com".to_string());
        assert!(cfg.validate().is_ok());
    }
}
