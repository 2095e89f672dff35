//! Direct hand-off to the enforcement service (C5) for the one verdict
//! the tarpit is allowed to raise on its own: hop-limit overflow. C5
//! remains the sole writer of the blocklist; this only reports the
//! already-unambiguous verdict, it does not write state itself.

use defense_common::config::TarpitSettings;
use defense_common::types::{Classification, EnforcementRequest, EscalationDecision, RequestMetadata, Trigger};
use tracing::warn;

pub async fn report_hop_overflow(
    http_client: &reqwest::Client,
    config: &TarpitSettings,
    metadata: RequestMetadata,
) {
    let decision = EscalationDecision {
        source_ip: metadata.source_ip,
        score: 1.0,
        reasons: vec!["hop_limit_exceeded".to_string()],
        classification: Classification::Malicious,
        trigger: Some(Trigger::HopLimit),
        captcha_url: None,
    };
    let request = EnforcementRequest { decision, metadata };
    let timeout = std::time::Duration::from_millis(config.enforcement_webhook_timeout_ms);

    let result = http_client
        .post(&config.enforcement_webhook_url)
        .json(&request)
        .timeout(timeout)
        .send()
        .await;
    if let Err(e) = result {
        warn!(error = %e, "hop-overflow enforcement hand-off failed");
    }
}
