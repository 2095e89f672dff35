//! Scoring pipeline: runs the configured `ScoreStep`s in order, applies
//! the decision rule, and decides the captcha band. Built once at
//! startup; disabled optional steps are simply absent from the vector.

use defense_common::config::EscalationSettings;
use defense_common::types::{Classification, EscalationDecision, RequestMetadata, Trigger};

use crate::steps::{ScoreStep, StepContext};

/// Pure decision rule, factored out of `Pipeline::run` so it is testable
/// without a live state store.
fn finalize(score: f64, config: &EscalationSettings) -> (Classification, Option<String>) {
    let classification = if score >= config.t_high {
        Classification::Malicious
    } else if score < config.t_low {
        Classification::Benign
    } else {
        Classification::Suspicious
    };

    let captcha_url = if classification == Classification::Suspicious
        && config.enable_captcha_trigger
        && score >= config.captcha_score_threshold_low
        && score <= config.captcha_score_threshold_high
    {
        config.captcha_verification_url.clone()
    } else {
        None
    };

    (classification, captcha_url)
}

pub struct Pipeline {
    steps: Vec<Box<dyn ScoreStep>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn ScoreStep>>) -> Self {
        Self { steps }
    }

    pub async fn run(&self, ctx: &StepContext<'_>, metadata: &RequestMetadata) -> EscalationDecision {
        let mut score = 0.0_f64;
        let mut reasons = Vec::new();
        let mut highest_trigger: Option<Trigger> = None;

        for step in &self.steps {
            let outcome = step.run(ctx, metadata, score).await;
            reasons.extend(outcome.reasons);

            if let Some(t) = outcome.trigger {
                highest_trigger = match highest_trigger {
                    Some(existing) if existing.severity() >= t.severity() => Some(existing),
                    _ => Some(t),
                };
            }

            if let Some(Classification::Benign) = outcome.classification_override {
                return EscalationDecision {
                    source_ip: metadata.source_ip,
                    score,
                    reasons,
                    classification: Classification::Benign,
                    trigger: None,
                    captcha_url: None,
                };
            }

            score = (score + outcome.score_delta).min(1.0);

            if let Some(Classification::Malicious) = outcome.classification_override {
                return EscalationDecision {
                    source_ip: metadata.source_ip,
                    score,
                    reasons,
                    classification: Classification::Malicious,
                    trigger: highest_trigger,
                    captcha_url: None,
                };
            }
        }

        let (classification, captcha_url) = finalize(score, ctx.config);

        EscalationDecision {
            source_ip: metadata.source_ip,
            score,
            reasons,
            classification,
            trigger: if classification == Classification::Malicious {
                highest_trigger
            } else {
                None
            },
            captcha_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_thresholds_are_consistent() {
        let config = EscalationSettings::default();
        assert!(config.t_low <= config.t_high);
    }

    #[test]
    fn test_score_at_t_high_is_malicious() {
        let config = EscalationSettings::default();
        let (classification, _) = finalize(config.t_high, &config);
        assert_eq!(classification, Classification::Malicious);
    }

    #[test]
    fn test_score_at_t_low_is_suspicious() {
        let config = EscalationSettings::default();
        let (classification, _) = finalize(config.t_low, &config);
        assert_eq!(classification, Classification::Suspicious);
    }

    #[test]
    fn test_score_below_t_low_is_benign() {
        let config = EscalationSettings::default();
        let (classification, _) = finalize(config.t_low - 0.01, &config);
        assert_eq!(classification, Classification::Benign);
    }

    #[test]
    fn test_captcha_band_only_when_enabled() {
        let mut config = EscalationSettings::default();
        config.enable_captcha_trigger = true;
        config.captcha_verification_url = Some("https://captcha.example.com".to_string());
        let score = (config.captcha_score_threshold_low + config.captcha_score_threshold_high) / 2.0;
        let (classification, captcha_url) = finalize(score, &config);
        assert_eq!(classification, Classification::Suspicious);
        assert!(captcha_url.is_some());

        config.enable_captcha_trigger = false;
        let (_, captcha_url) = finalize(score, &config);
        assert!(captcha_url.is_none());
    }
}
