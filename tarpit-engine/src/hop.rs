//! Hop accounting: every tarpit link click increments a per-source
//! counter in the shared state store. Crossing `max_hops` within
//! `hop_window_seconds` is itself a malicious signal, handled without
//! waiting on C4 since it's an unambiguous verdict.

use std::net::IpAddr;
use std::time::Duration;

use defense_common::config::TarpitSettings;
use defense_common::error::Result;
use defense_common::state::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopOutcome {
    Continue,
    Overflow,
}

pub async fn record_hop(
    state: &StateStore,
    src: IpAddr,
    config: &TarpitSettings,
) -> Result<HopOutcome> {
    let window = Duration::from_secs(config.hop_window_seconds);
    let count = state.incr_hops(src, window).await?;
    if count > config.max_hops {
        Ok(HopOutcome::Overflow)
    } else {
        Ok(HopOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_outcome_equality() {
        assert_eq!(HopOutcome::Continue, HopOutcome::Continue);
        assert_ne!(HopOutcome::Continue, HopOutcome::Overflow);
    }
}
