//! Process-wide logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from `RUST_LOG` (default
/// `info`). Later calls are no-ops, so tests and embedding binaries can
/// both call it unconditionally.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
