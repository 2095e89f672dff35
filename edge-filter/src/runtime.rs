//! Explicit `Runtime` struct replacing global mutable state: constructed
//! once at startup and injected into every handler via `with_state`.

use std::time::Duration;

use defense_common::state::StateStoreConfig;
use defense_common::{DefenseConfig, StateStore};

#[derive(Clone)]
pub struct Runtime {
    pub config: DefenseConfig,
    pub state: StateStore,
    pub http_client: reqwest::Client,
}

impl Runtime {
    pub async fn new(config: DefenseConfig) -> anyhow::Result<Self> {
        let state_cfg = StateStoreConfig {
            url: config.state_store.state_store_url.clone(),
            operation_timeout: Duration::from_millis(config.state_store.state_store_timeout_ms),
        };
        let state = StateStore::connect(&state_cfg).await?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.edge_filter.tarpit_upstream_timeout_ms))
            .build()?;
        Ok(Self {
            config,
            state,
            http_client,
        })
    }
}
