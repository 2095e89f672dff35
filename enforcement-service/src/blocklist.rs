//! C5 is the sole writer of the blocklist. Even C3's hop-overflow path
//! reaches the blocklist only by calling this service's webhook.

use std::time::Duration;

use defense_common::config::EnforcementSettings;
use defense_common::error::Result;
use defense_common::state::StateStore;
use defense_common::types::EscalationDecision;

pub async fn apply_block(state: &StateStore, config: &EnforcementSettings, decision: &EscalationDecision) -> Result<()> {
    let ttl = Duration::from_secs(config.blocklist_ttl_seconds);
    let reason = decision.reasons.join(";");
    state.add_block(decision.source_ip, ttl, &reason).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_join_is_semicolon_separated() {
        let reasons = vec!["a".to_string(), "b".to_string()];
        assert_eq!(reasons.join(";"), "a;b");
    }
}
