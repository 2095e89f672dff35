//! Tracing setup shared by all four binaries.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging. `component` becomes the default
/// env-filter target when `RUST_LOG`/`DEFENSE_LOG` is unset.
pub fn init_tracing(component: &str) {
    let filter = std::env::var("DEFENSE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| format!("{component}=info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_line_number(true);

    if std::env::var("DEFENSE_LOG_JSON").is_ok() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
