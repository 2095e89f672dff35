//! Explicit `Runtime` struct, constructed once at startup: state store,
//! the in-memory Markov model, concurrency governor, and an outbound
//! HTTP client, all injected via `with_state`.

use std::sync::Arc;
use std::time::Duration;

use defense_common::markov::{MarkovModel, MarkovReader};
use defense_common::state::StateStoreConfig;
use defense_common::{DefenseConfig, StateStore};

use crate::stream::TarpitConcurrency;

#[derive(Clone)]
pub struct Runtime {
    pub config: DefenseConfig,
    pub state: StateStore,
    pub model: Arc<MarkovModel>,
    pub concurrency: Arc<TarpitConcurrency>,
    pub http_client: reqwest::Client,
}

impl Runtime {
    pub async fn new(config: DefenseConfig) -> anyhow::Result<Self> {
        let state_cfg = StateStoreConfig {
            url: config.state_store.state_store_url.clone(),
            operation_timeout: Duration::from_millis(config.state_store.state_store_timeout_ms),
        };
        let state = StateStore::connect(&state_cfg).await?;

        let reader = MarkovReader::connect(&config.tarpit.markov_database_url).await?;
        let model = reader.load().await?;

        let concurrency = Arc::new(TarpitConcurrency::new(
            config.tarpit.max_global_connections,
            config.tarpit.max_connections_per_ip,
        ));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.tarpit.escalation_post_timeout_ms))
            .build()?;

        Ok(Self {
            config,
            state,
            model,
            concurrency,
            http_client,
        })
    }
}
