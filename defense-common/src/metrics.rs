//! Prometheus metrics wiring shared by all four binaries.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{DefenseError, Result};

/// Start a Prometheus exporter bound to `listen_addr`. Call once per
/// process; the returned handle keeps the exporter alive for the life of
/// the binary.
pub fn start_metrics_server(listen_addr: &str) -> Result<()> {
    let addr: SocketAddr = listen_addr
        .parse()
        .map_err(|e| DefenseError::Config(format!("invalid metrics listen_addr '{listen_addr}': {e}")))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| DefenseError::Other(format!("installing metrics exporter: {e}")))?;
    Ok(())
}

/// Describe the counters and gauges common across components. Per-binary
/// `main()` calls this once at startup before registering its own
/// component-specific metrics.
pub fn describe_common_metrics() {
    metrics::describe_counter!("defense_requests_total", "Total requests handled");
    metrics::describe_counter!("defense_blocks_total", "Total requests rejected with 403");
    metrics::describe_counter!("defense_tarpit_hits_total", "Total requests rewritten into the tarpit");
    metrics::describe_counter!("defense_escalations_total", "Total requests scored by the escalation engine");
    metrics::describe_counter!("defense_enforcement_blocks_total", "Total blocklist writes issued");
    metrics::describe_gauge!("defense_pipeline_latency_ms", "Latency of the last processed request in milliseconds");
}
