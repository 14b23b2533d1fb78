//! Process-wide structured logging, installed once at startup by every binary.
use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber that writes to stdout using `filter` as the default
/// directive, overridable by the `RUST_LOG` environment variable.
pub fn initialize(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Like [`initialize`] but safe to call more than once, for test binaries that share a process.
pub fn initialize_for_tests(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}
