//! `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber writing compact output to stderr.
///
/// `RUST_LOG` wins over `level`. Later calls are no-ops.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
