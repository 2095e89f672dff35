//! Escalation Engine (C4): scores `RequestMetadata` through a pipeline
//! of independent signals and, for malicious verdicts, hands off to the
//! enforcement service.

mod classifier;
mod enforcement_client;
mod features;
mod pipeline;
mod runtime;
mod steps;

use std::net::SocketAddr;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use defense_common::types::{Classification, EnforcementRequest, EscalationDecision, RequestMetadata};
use tracing::info;

use runtime::Runtime;
use steps::StepContext;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    defense_common::logging::init_tracing("escalation_engine");

    let config_path = std::env::var("DEFENSE_CONFIG").unwrap_or_else(|_| "config/escalation-engine".to_string());
    let config = defense_common::DefenseConfig::from_file(&config_path)?;
    config.validate()?;

    if config.metrics.enabled {
        defense_common::metrics::start_metrics_server(&config.metrics.listen_addr)?;
        defense_common::metrics::describe_common_metrics();
    }

    let runtime = Runtime::new(config.clone()).await?;

    // Mounted at both paths per the deployment-name ambiguity noted in
    // the design notes: some deployments call this endpoint /escalate,
    // others /analyze.
    let app = Router::new()
        .route("/health", get(health))
        .route("/escalate", post(handle_escalate))
        .route("/analyze", post(handle_escalate))
        .with_state(runtime);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!(%addr, "escalation engine listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

async fn handle_escalate(State(runtime): State<Runtime>, Json(metadata): Json<RequestMetadata>) -> impl IntoResponse {
    let ctx = StepContext::new(
        &runtime.state,
        &runtime.config.escalation,
        runtime.classifier.as_deref(),
        &runtime.http_client,
    );

    let decision: EscalationDecision = runtime.pipeline.run(&ctx, &metadata).await;

    metrics::counter!("defense_escalations_total").increment(1);

    if decision.classification == Classification::Malicious {
        let request = EnforcementRequest {
            decision: decision.clone(),
            metadata,
        };
        enforcement_client::notify_enforcement(&runtime.http_client, &runtime.config.escalation, &request).await;
    }

    Json(decision)
}
