//! Scoring signals as `ScoreStep` trait objects. The engine owns a
//! `Vec<Box<dyn ScoreStep>>` built once at startup from config, so a
//! disabled step (reputation, LLM) is simply absent from the vector
//! rather than checked at every request.

use std::time::Duration;

use async_trait::async_trait;
use defense_common::config::EscalationSettings;
use defense_common::state::StateStore;
use defense_common::types::RequestMetadata;
use tracing::warn;

use crate::classifier::ClassifierArtifact;
use crate::features::RequestFeatures;

pub struct StepContext<'a> {
    pub state: &'a StateStore,
    pub config: &'a EscalationSettings,
    pub classifier: Option<&'a ClassifierArtifact>,
    pub http_client: &'a reqwest::Client,
    /// Memoized windowed request count, written by whichever step records
    /// it first. `record_request` is an appending write, so steps that
    /// both want the count (frequency, classifier feature extraction)
    /// must share one call per request rather than each pushing a
    /// timestamp into the window.
    request_count: std::sync::OnceLock<i64>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        state: &'a StateStore,
        config: &'a EscalationSettings,
        classifier: Option<&'a ClassifierArtifact>,
        http_client: &'a reqwest::Client,
    ) -> Self {
        Self {
            state,
            config,
            classifier,
            http_client,
            request_count: std::sync::OnceLock::new(),
        }
    }

    async fn request_count(&self, metadata: &RequestMetadata) -> defense_common::error::Result<i64> {
        if let Some(&n) = self.request_count.get() {
            return Ok(n);
        }
        let window = Duration::from_secs(self.config.frequency_window_sec);
        let n = self
            .state
            .record_request(metadata.source_ip, metadata.timestamp_utc, window)
            .await?;
        let _ = self.request_count.set(n);
        Ok(n)
    }
}

/// Result of a single step. `classification_override` short-circuits the
/// remaining pipeline when set (used by the benign heuristic match and
/// by a positive LLM verdict).
pub struct StepOutcome {
    pub score_delta: f64,
    pub reasons: Vec<String>,
    pub classification_override: Option<defense_common::types::Classification>,
    pub trigger: Option<defense_common::types::Trigger>,
}

impl StepOutcome {
    fn none() -> Self {
        Self {
            score_delta: 0.0,
            reasons: Vec::new(),
            classification_override: None,
            trigger: None,
        }
    }
}

#[async_trait]
pub trait ScoreStep: Send + Sync {
    async fn run(&self, ctx: &StepContext<'_>, metadata: &RequestMetadata, partial_score: f64) -> StepOutcome;
}

/// Step 1: sliding-window request frequency, saturating at `n_sat`.
pub struct FrequencyStep;

#[async_trait]
impl ScoreStep for FrequencyStep {
    async fn run(&self, ctx: &StepContext<'_>, metadata: &RequestMetadata, _partial_score: f64) -> StepOutcome {
        match ctx.request_count(metadata).await {
            Ok(n) => {
                let delta = (n as f64 / ctx.config.n_sat).min(1.0);
                StepOutcome {
                    score_delta: delta,
                    reasons: vec![format!("frequency:{n}")],
                    classification_override: None,
                    trigger: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "frequency step failed, skipping");
                let mut outcome = StepOutcome::none();
                outcome.reasons.push("frequency_skipped".to_string());
                outcome
            }
        }
    }
}

/// Step 2: known-bad / known-benign user-agent substrings.
pub struct HeuristicStep;

#[async_trait]
impl ScoreStep for HeuristicStep {
    async fn run(&self, ctx: &StepContext<'_>, metadata: &RequestMetadata, _partial_score: f64) -> StepOutcome {
        let ua_lower = metadata.user_agent.to_ascii_lowercase();

        if ctx
            .config
            .known_benign_uas
            .iter()
            .any(|s| ua_lower.contains(&s.to_ascii_lowercase()))
        {
            return StepOutcome {
                score_delta: 0.0,
                reasons: vec!["known_benign_ua".to_string()],
                classification_override: Some(defense_common::types::Classification::Benign),
                trigger: None,
            };
        }

        if ctx
            .config
            .known_bad_uas
            .iter()
            .any(|s| ua_lower.contains(&s.to_ascii_lowercase()))
        {
            return StepOutcome {
                score_delta: ctx.config.heuristic_bad_ua_bonus,
                reasons: vec!["known_bad_ua".to_string()],
                classification_override: None,
                trigger: Some(defense_common::types::Trigger::Heuristic),
            };
        }

        StepOutcome::none()
    }
}

/// Step 3: pre-trained logistic-regression classifier over extracted features.
pub struct ClassifierStep;

#[async_trait]
impl ScoreStep for ClassifierStep {
    async fn run(&self, ctx: &StepContext<'_>, metadata: &RequestMetadata, _partial_score: f64) -> StepOutcome {
        let Some(artifact) = ctx.classifier else {
            let mut outcome = StepOutcome::none();
            outcome.reasons.push("classifier_unavailable".to_string());
            return outcome;
        };

        let count = ctx.request_count(metadata).await.unwrap_or(1);

        let features = RequestFeatures::extract(
            metadata,
            count,
            &ctx.config.known_bad_uas,
            &ctx.config.known_benign_uas,
        );
        let probability = artifact.predict(&features);

        StepOutcome {
            score_delta: probability * ctx.config.classifier_weight,
            reasons: vec![format!("classifier:{probability:.3}")],
            classification_override: None,
            trigger: Some(defense_common::types::Trigger::Model),
        }
    }
}

#[derive(serde::Deserialize)]
struct ReputationResponse {
    malicious_score: f64,
}

/// Step 4 (optional): external IP reputation lookup.
pub struct ReputationStep {
    pub api_url: String,
    pub api_key: Option<defense_common::secret::Secret<String>>,
    pub timeout: Duration,
}

#[async_trait]
impl ScoreStep for ReputationStep {
    async fn run(&self, ctx: &StepContext<'_>, metadata: &RequestMetadata, _partial_score: f64) -> StepOutcome {
        let mut request = ctx
            .http_client
            .get(&self.api_url)
            .query(&[("ip", metadata.source_ip.to_string())])
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key.expose_secret());
        }

        match request.send().await {
            Ok(response) => match response.json::<ReputationResponse>().await {
                Ok(body) if body.malicious_score >= ctx.config.ip_reputation_min_malicious_threshold => StepOutcome {
                    score_delta: ctx.config.ip_reputation_malicious_score_bonus,
                    reasons: vec!["reputation".to_string()],
                    classification_override: None,
                    trigger: Some(defense_common::types::Trigger::Reputation),
                },
                Ok(_) => StepOutcome::none(),
                Err(e) => {
                    warn!(error = %e, "reputation response parse failed, skipping");
                    let mut outcome = StepOutcome::none();
                    outcome.reasons.push("reputation_skipped".to_string());
                    outcome
                }
            },
            Err(e) => {
                warn!(error = %e, "reputation lookup failed, skipping");
                let mut outcome = StepOutcome::none();
                outcome.reasons.push("reputation_skipped".to_string());
                outcome
            }
        }
    }
}

#[derive(serde::Serialize)]
struct LlmRequest<'a> {
    metadata: &'a RequestMetadata,
}

#[derive(serde::Deserialize)]
struct LlmResponse {
    malicious: bool,
}

/// Step 5 (optional): only invoked when the running score sits in the
/// "middle band" after the earlier steps, since it is the most expensive
/// call in the pipeline.
pub struct LlmStep {
    pub api_url: String,
    pub bearer_token: Option<defense_common::secret::Secret<String>>,
    pub timeout: Duration,
}

#[async_trait]
impl ScoreStep for LlmStep {
    async fn run(&self, ctx: &StepContext<'_>, metadata: &RequestMetadata, partial_score: f64) -> StepOutcome {
        if !(ctx.config.t_low..ctx.config.t_high).contains(&partial_score) {
            return StepOutcome::none();
        }

        let mut request = ctx
            .http_client
            .post(&self.api_url)
            .json(&LlmRequest { metadata })
            .timeout(self.timeout);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token.expose_secret());
        }

        match request.send().await {
            Ok(response) => match response.json::<LlmResponse>().await {
                Ok(body) if body.malicious => StepOutcome {
                    score_delta: 1.0,
                    reasons: vec!["llm".to_string()],
                    classification_override: Some(defense_common::types::Classification::Malicious),
                    trigger: Some(defense_common::types::Trigger::Llm),
                },
                Ok(_) => StepOutcome::none(),
                Err(e) => {
                    warn!(error = %e, "llm response parse failed, skipping");
                    let mut outcome = StepOutcome::none();
                    outcome.reasons.push("llm_skipped".to_string());
                    outcome
                }
            },
            Err(e) => {
                warn!(error = %e, "llm classification call failed, skipping");
                let mut outcome = StepOutcome::none();
                outcome.reasons.push("llm_skipped".to_string());
                outcome
            }
        }
    }
}
