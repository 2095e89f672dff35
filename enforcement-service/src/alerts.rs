//! Alert dispatch: webhook, Slack incoming-webhook, or SMTP, selected
//! by `AlertMethod`. An alert is suppressed if the decision's
//! highest-severity reason is below the configured floor.

use chrono::Utc;
use defense_common::config::{AlertMethod, EnforcementSettings};
use defense_common::secret::Secret;
use defense_common::types::EscalationDecision;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    src: std::net::IpAddr,
    reasons: &'a [String],
    score: f64,
    ts: chrono::DateTime<Utc>,
}

pub async fn dispatch(http_client: &reqwest::Client, config: &EnforcementSettings, decision: &EscalationDecision) {
    if decision.highest_severity() < config.alert_min_reason_severity {
        return;
    }

    match config.alert_method {
        AlertMethod::None => {}
        AlertMethod::Webhook => {
            if let Some(url) = &config.alert_webhook_url {
                send_webhook(http_client, url, decision).await;
            }
        }
        AlertMethod::Slack => {
            if let Some(url) = &config.alert_slack_webhook_url {
                send_webhook(http_client, url, decision).await;
            }
        }
        AlertMethod::Smtp => send_smtp(config, decision).await,
    }
}

async fn send_webhook(http_client: &reqwest::Client, url: &str, decision: &EscalationDecision) {
    let payload = WebhookPayload {
        event: "ip_blocked",
        src: decision.source_ip,
        reasons: &decision.reasons,
        score: decision.score,
        ts: Utc::now(),
    };
    if let Err(e) = http_client.post(url).json(&payload).send().await {
        warn!(error = %e, "alert webhook dispatch failed");
    }
}

async fn send_smtp(config: &EnforcementSettings, decision: &EscalationDecision) {
    let (Some(host), Some(to), Some(from)) = (
        config.alert_smtp_host.as_deref(),
        config.alert_email_to.as_deref(),
        config.alert_email_from.as_deref(),
    ) else {
        warn!("smtp alert method configured without host/to/from, skipping");
        return;
    };

    let body = format!(
        "Source {} blocked.\nScore: {:.3}\nReasons: {}\n",
        decision.source_ip,
        decision.score,
        decision.reasons.join(", ")
    );

    let email = match Message::builder()
        .from(match from.parse::<Mailbox>() {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "invalid alert_email_from, skipping smtp dispatch");
                return;
            }
        })
        .to(match to.parse::<Mailbox>() {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "invalid alert_email_to, skipping smtp dispatch");
                return;
            }
        })
        .subject(format!("Source blocked: {}", decision.source_ip))
        .body(body)
    {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "failed to build alert email");
            return;
        }
    };

    let mut builder = if config.alert_smtp_use_tls {
        match AsyncSmtpTransport::<Tokio1Executor>::relay(host) {
            Ok(b) => b.port(config.alert_smtp_port),
            Err(e) => {
                warn!(error = %e, "failed to configure smtp relay over tls, skipping dispatch");
                return;
            }
        }
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(config.alert_smtp_port)
    };

    let username = config
        .alert_smtp_username_file
        .as_deref()
        .and_then(|path| Secret::from_file(std::path::Path::new(path)).ok());
    let password = config
        .alert_smtp_password_file
        .as_deref()
        .and_then(|path| Secret::from_file(std::path::Path::new(path)).ok());

    if let (Some(username), Some(password)) = (&username, &password) {
        builder = builder.credentials(Credentials::new(
            username.expose_secret().to_string(),
            password.expose_secret().to_string(),
        ));
    }

    let transport = builder.build();
    if let Err(e) = transport.send(email).await {
        warn!(error = %e, "smtp alert dispatch failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use defense_common::types::{Classification, Severity};

    fn sample_decision(reasons: Vec<String>, trigger: Option<defense_common::types::Trigger>) -> EscalationDecision {
        EscalationDecision {
            source_ip: "203.0.113.4".parse().unwrap(),
            score: 0.9,
            reasons,
            classification: Classification::Malicious,
            trigger,
            captcha_url: None,
        }
    }

    #[test]
    fn test_severity_below_floor_is_suppressed() {
        let decision = sample_decision(vec!["frequency".to_string()], None);
        assert!(decision.highest_severity() < Severity::Model);
    }
}
