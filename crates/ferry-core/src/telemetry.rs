use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with an environment-driven filter.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ferry=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    tracing::debug!("Tracing initialized");
}
