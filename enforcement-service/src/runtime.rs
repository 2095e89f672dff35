//! Explicit `Runtime` struct: state store plus an outbound HTTP client
//! shared by community reporting and webhook/Slack alert dispatch.

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
        let http_client = reqwest::Client::builder().build()?;
        Ok(Self {
            config,
            state,
            http_client,
        })
    }
}
