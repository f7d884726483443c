//! JSON log output for the engine and its background workers.

use tracing_subscriber::EnvFilter;

/// Install the global JSON subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directives` is used
/// (e.g. `"info,stockyard_infra=debug"` to see sweep skips).
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_default(default_directives: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
