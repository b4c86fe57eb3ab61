//! Tracing setup for binaries and tests embedding the library.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Later calls are no-ops, so it is safe from tests.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
