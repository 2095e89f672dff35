//! Bounded-retry hand-off to the enforcement service (C5) for malicious
//! verdicts, modeled on the teacher's `OrchestratorClient` retry idiom:
//! a fixed attempt budget with exponential backoff, logged and dropped
//! on exhaustion rather than propagated.

use std::time::Duration;

use defense_common::config::EscalationSettings;
use defense_common::types::EnforcementRequest;
use tracing::{error, warn};

const BACKOFFS_MS: [u64; 3] = [500, 1000, 2000];

pub async fn notify_enforcement(
    http_client: &reqwest::Client,
    config: &EscalationSettings,
    request: &EnforcementRequest,
) {
    let timeout = Duration::from_millis(config.enforcement_webhook_timeout_ms);

    for (attempt, backoff_ms) in BACKOFFS_MS.iter().enumerate() {
        let result = http_client
            .post(&config.enforcement_webhook_url)
            .json(request)
            .timeout(timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => return,
            Ok(response) => {
                warn!(status = %response.status(), attempt, "enforcement webhook rejected request");
            }
            Err(e) => {
                warn!(error = %e, attempt, "enforcement webhook call failed");
            }
        }

        if attempt + 1 < BACKOFFS_MS.len() {
            tokio::time::sleep(Duration::from_millis(*backoff_ms)).await;
        }
    }

    error!(
        source_ip = %request.decision.source_ip,
        "enforcement hand-off exhausted all retries, dropping event"
    );
}
