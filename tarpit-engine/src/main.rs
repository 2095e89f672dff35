//! Tarpit Engine (C3): serves deterministic, slowly-streamed fake pages
//! to sources the edge filter has already flagged. Flags the source in
//! the shared state store before handing off to escalation, accounts
//! hops, and reports hop-limit overflow straight to enforcement.

mod enforcement_client;
mod escalation_client;
mod generate;
mod hop;
mod runtime;
mod stream;

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use defense_common::http::{build_request_metadata, extract_source_ip};
use tracing::{info, warn};

use hop::HopOutcome;
use runtime::Runtime;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    defense_common::logging::init_tracing("tarpit_engine");

    let config_path = std::env::var("DEFENSE_CONFIG").unwrap_or_else(|_| "config/tarpit-engine".to_string());
    let config = defense_common::DefenseConfig::from_file(&config_path)?;
    config.validate()?;

    if config.metrics.enabled {
        defense_common::metrics::start_metrics_server(&config.metrics.listen_addr)?;
        defense_common::metrics::describe_common_metrics();
    }

    let runtime = Runtime::new(config.clone()).await?;

    let app = Router::new()
        .route("/health", get(health))
        .fallback(handle_request)
        .with_state(runtime);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!(%addr, "tarpit engine listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "healthy"}))
}

async fn handle_request(
    State(runtime): State<Runtime>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let headers = request.headers().clone();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("").to_string();

    let Some(source_ip) = extract_source_ip(&headers, Some(remote)) else {
        warn!("could not extract source ip in tarpit engine");
        return (StatusCode::BAD_REQUEST, "").into_response();
    };

    let metadata = build_request_metadata(source_ip, &method, &path, &query, &headers);

    let Some(permits) = runtime.concurrency.try_acquire(source_ip).await else {
        metrics::counter!("defense_tarpit_saturated_total").increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "").into_response();
    };

    let tarpit_cfg = &runtime.config.tarpit;

    if let Err(e) = runtime
        .state
        .flag_tarpit(source_ip, Duration::from_secs(tarpit_cfg.tarpit_flag_ttl_seconds))
        .await
    {
        warn!(error = %e, "failed to set tarpit flag");
    }

    let hop_outcome = match hop::record_hop(&runtime.state, source_ip, tarpit_cfg).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "hop accounting failed, treating as continue");
            HopOutcome::Continue
        }
    };

    if hop_outcome == HopOutcome::Overflow {
        enforcement_client::report_hop_overflow(&runtime.http_client, tarpit_cfg, metadata).await;
        metrics::counter!("defense_escalations_total").increment(1);
        return (StatusCode::FORBIDDEN, "Access Denied.").into_response();
    }

    escalation_client::notify_escalation(runtime.http_client.clone(), tarpit_cfg.clone(), metadata);

    let chunks = generate::render_chunks(&runtime.model, tarpit_cfg, &path);
    metrics::counter!("defense_tarpit_hits_total").increment(1);

    let body = stream::stream_chunks(chunks, tarpit_cfg.min_delay_sec, tarpit_cfg.max_delay_sec, permits);

    let mut response = Response::new(body);
    response
        .headers_mut()
        .insert("content-type", "text/html; charset=utf-8".parse().unwrap());
    response
}
