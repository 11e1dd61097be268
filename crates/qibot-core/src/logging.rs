use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info,qibot=debug";

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
///
/// Calling it more than once is harmless; later calls are ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
