//! Edge Filter (C2): first-touch classifier sitting in front of the
//! hosting web server. Blocklist lookup, bad-agent pattern block, header
//! heuristics, and the tarpit rewrite escape hatch.

mod filter;
mod runtime;

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use defense_common::http::{build_request_metadata, extract_source_ip};
use tracing::{info, warn};

use filter::FilterOutcome;
use runtime::Runtime;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    defense_common::logging::init_tracing("edge_filter");

    let config_path = std::env::var("DEFENSE_CONFIG").unwrap_or_else(|_| "config/edge-filter".to_string());
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
    info!(%addr, "edge filter listening");
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
        warn!("could not extract source ip, passing through");
        return (StatusCode::OK, "").into_response();
    };

    let metadata = build_request_metadata(source_ip, &method, &path, &query, &headers);

    let outcome = filter::classify(&runtime.state, &runtime.config.edge_filter, &metadata).await;

    metrics::counter!("defense_requests_total").increment(1);

    match outcome {
        FilterOutcome::Blocked => {
            metrics::counter!("defense_blocks_total").increment(1);
            (StatusCode::FORBIDDEN, "Access Denied.").into_response()
        }
        FilterOutcome::PassThrough => (StatusCode::OK, "").into_response(),
        FilterOutcome::TarpitRewrite {
            rewritten_path_and_query,
            reasons,
        } => {
            metrics::counter!("defense_tarpit_hits_total").increment(1);
            runtime
                .proxy_to_tarpit(&rewritten_path_and_query, &reasons, &headers, &method, source_ip)
                .await
        }
    }
}

impl Runtime {
    async fn proxy_to_tarpit(
        &self,
        rewritten_path_and_query: &str,
        reasons: &[String],
        headers: &axum::http::HeaderMap,
        method: &str,
        source_ip: std::net::IpAddr,
    ) -> Response {
        let url = format!("{}{}", self.config.edge_filter.tarpit_upstream_url, rewritten_path_and_query);
        let mut req = self
            .http_client
            .request(
                method
                    .parse()
                    .unwrap_or(reqwest::Method::GET),
                &url,
            )
            .timeout(std::time::Duration::from_millis(
                self.config.edge_filter.tarpit_upstream_timeout_ms,
            ));

        // tarpit-engine runs as its own process and keys hop/flag accounting
        // off this header, not its own ConnectInfo, so the resolved source
        // must win over anything the client supplied.
        for (name, value) in headers.iter() {
            if name.as_str().eq_ignore_ascii_case("x-forwarded-for") {
                continue;
            }
            if let Ok(v) = value.to_str() {
                req = req.header(name.as_str(), v);
            }
        }
        req = req.header("X-Forwarded-For", source_ip.to_string());
        req = req.header("X-Tarpit-Reason", reasons.join(";"));

        match req.send().await {
            Ok(upstream) => {
                let status = StatusCode::from_u16(upstream.status().as_u16())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                let content_type = upstream
                    .headers()
                    .get("content-type")
                    .cloned()
                    .unwrap_or_else(|| HeaderValue::from_static("text/html"));
                let stream = upstream.bytes_stream();
                let body = Body::from_stream(stream);
                let mut response = Response::new(body);
                *response.status_mut() = status;
                response.headers_mut().insert("content-type", content_type);
                response
            }
            Err(e) => {
                warn!(error = %e, "failed to proxy request to tarpit engine");
                (StatusCode::BAD_GATEWAY, "").into_response()
            }
        }
    }
}
