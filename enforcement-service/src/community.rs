//! Optional community blocklist reporting: a structured report POSTed
//! to a shared feed. Failures are logged and never abort enforcement.

use std::time::Duration;

use chrono::Utc;
use defense_common::config::EnforcementSettings;
use defense_common::secret::Secret;
use defense_common::types::EscalationDecision;
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
struct CommunityReport<'a> {
    source_ip: std::net::IpAddr,
    categories: &'a [String],
    evidence: f64,
    timestamp: chrono::DateTime<Utc>,
}

pub async fn report(http_client: &reqwest::Client, config: &EnforcementSettings, decision: &EscalationDecision) {
    if !config.enable_community_reporting {
        return;
    }
    let Some(url) = &config.community_blocklist_report_url else {
        return;
    };

    let report = CommunityReport {
        source_ip: decision.source_ip,
        categories: &decision.reasons,
        evidence: decision.score,
        timestamp: Utc::now(),
    };

    let api_key = config
        .community_blocklist_api_key_file
        .as_deref()
        .and_then(|path| Secret::from_file(std::path::Path::new(path)).ok());

    let mut request = http_client
        .post(url)
        .json(&report)
        .timeout(Duration::from_secs(config.community_blocklist_report_timeout_sec));
    if let Some(key) = &api_key {
        request = request.header("X-Api-Key", key.expose_secret());
    }

    if let Err(e) = request.send().await {
        warn!(error = %e, "community blocklist report failed");
    }
}
