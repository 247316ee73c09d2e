//! Tracing setup shared by the binaries

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Logs go to stderr so the console
/// conversation on stdout stays readable. `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
