use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber. Safe to call more than once; later calls are no-ops.
pub fn init(component: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(component = component, "logging initialized");
    }
}
