//! Fire-and-forget hand-off to the escalation engine (C4). The streaming
//! response must not wait on this: the POST is spawned onto its own task
//! and its result only logged, never propagated.

use defense_common::config::TarpitSettings;
use defense_common::types::RequestMetadata;
use tracing::warn;

pub fn notify_escalation(http_client: reqwest::Client, config: TarpitSettings, metadata: RequestMetadata) {
    tokio::spawn(async move {
        let timeout = std::time::Duration::from_millis(config.escalation_post_timeout_ms);
        let result = http_client
            .post(&config.escalation_post_url)
            .json(&metadata)
            .timeout(timeout)
            .send()
            .await;
        if let Err(e) = result {
            warn!(error = %e, "escalation hand-off failed");
        }
    });
}
