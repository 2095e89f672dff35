//! Explicit `Runtime` struct: state store, loaded classifier artifact,
//! HTTP client, and the scoring pipeline built once at startup from
//! config. No ambient singletons beyond the state-store multiplexer.

use std::time::Duration;

use defense_common::secret::Secret;
use defense_common::state::StateStoreConfig;
use defense_common::{DefenseConfig, StateStore};
use tracing::{info, warn};

use crate::classifier::ClassifierArtifact;
use crate::pipeline::Pipeline;
use crate::steps::{ClassifierStep, FrequencyStep, HeuristicStep, LlmStep, ReputationStep, ScoreStep};

#[derive(Clone)]
pub struct Runtime {
    pub config: DefenseConfig,
    pub state: StateStore,
    pub http_client: reqwest::Client,
    pub classifier: Option<std::sync::Arc<ClassifierArtifact>>,
    pub pipeline: std::sync::Arc<Pipeline>,
}

impl Runtime {
    pub async fn new(config: DefenseConfig) -> anyhow::Result<Self> {
        let state_cfg = StateStoreConfig {
            url: config.state_store.state_store_url.clone(),
            operation_timeout: Duration::from_millis(config.state_store.state_store_timeout_ms),
        };
        let state = StateStore::connect(&state_cfg).await?;
        let http_client = reqwest::Client::builder().build()?;

        let classifier = match &config.escalation.model_artifact_path {
            Some(path) => match ClassifierArtifact::load(path) {
                Ok(artifact) => Some(std::sync::Arc::new(artifact)),
                Err(e) => {
                    warn!(error = %e, path, "model artifact failed to load, classifier step will be skipped");
                    None
                }
            },
            None => None,
        };

        let mut steps: Vec<Box<dyn ScoreStep>> = vec![Box::new(FrequencyStep), Box::new(HeuristicStep)];

        if classifier.is_some() {
            steps.push(Box::new(ClassifierStep));
        }

        if config.escalation.enable_ip_reputation {
            if let Some(api_url) = config.escalation.ip_reputation_api_url.clone() {
                let api_key = match &config.escalation.ip_reputation_api_key_file {
                    Some(path) => Secret::from_file(std::path::Path::new(path)).ok(),
                    None => None,
                };
                steps.push(Box::new(ReputationStep {
                    api_url,
                    api_key,
                    timeout: Duration::from_millis(config.escalation.ip_reputation_timeout_ms),
                }));
            }
        }

        if config.escalation.enable_llm_classification {
            if let Some(api_url) = config.escalation.llm_api_url.clone() {
                let bearer_token = match &config.escalation.llm_bearer_token_file {
                    Some(path) => Secret::from_file(std::path::Path::new(path)).ok(),
                    None => None,
                };
                steps.push(Box::new(LlmStep {
                    api_url,
                    bearer_token,
                    timeout: Duration::from_secs(config.escalation.llm_timeout_sec),
                }));
            }
        }

        info!(step_count = steps.len(), "scoring pipeline assembled");

        Ok(Self {
            config,
            state,
            http_client,
            classifier,
            pipeline: std::sync::Arc::new(Pipeline::new(steps)),
        })
    }
}
