//! Enforcement Service (C5): the sole writer of the blocklist. Accepts
//! `{decision, metadata}` from C4 (or C3's hop-overflow path), blocks
//! the source, optionally reports it to a community feed, and dispatches
//! an alert if the decision's severity clears the configured floor.

mod alerts;
mod blocklist;
mod community;
mod runtime;

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use defense_common::types::EnforcementRequest;
use tracing::{info, warn};

use runtime::Runtime;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    defense_common::logging::init_tracing("enforcement_service");

    let config_path = std::env::var("DEFENSE_CONFIG").unwrap_or_else(|_| "config/enforcement-service".to_string());
    let config = defense_common::DefenseConfig::from_file(&config_path)?;
    config.validate()?;

    if config.metrics.enabled {
        defense_common::metrics::start_metrics_server(&config.metrics.listen_addr)?;
        defense_common::metrics::describe_common_metrics();
    }

    let runtime = Runtime::new(config.clone()).await?;

    let app = Router::new()
        .route("/health", get(health))
        .route("/analyze", post(handle_analyze))
        .with_state(runtime);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!(%addr, "enforcement service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

async fn handle_analyze(
    State(runtime): State<Runtime>,
    Json(request): Json<EnforcementRequest>,
) -> impl IntoResponse {
    let EnforcementRequest { decision, .. } = &request;

    if let Err(e) = blocklist::apply_block(&runtime.state, &runtime.config.enforcement, decision).await {
        warn!(error = %e, source_ip = %decision.source_ip, "failed to write blocklist entry");
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"status": "error"})));
    }

    metrics::counter!("defense_enforcement_blocks_total").increment(1);

    community::report(&runtime.http_client, &runtime.config.enforcement, decision).await;
    alerts::dispatch(&runtime.http_client, &runtime.config.enforcement, decision).await;

    (StatusCode::ACCEPTED, Json(serde_json::json!({"status": "accepted"})))
}
