use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
