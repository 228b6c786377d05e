//! Tracing setup for embedding applications.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a global `FmtSubscriber` writing to stderr.
///
/// Honors `RUST_LOG`; falls back to `info`. Safe to call more than once
/// (later calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
