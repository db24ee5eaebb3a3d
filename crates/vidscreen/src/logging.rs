//! Log output setup for binaries and tests embedding the pipeline.

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, or by
/// `default_filter` when it is unset, and forwards `log` records to it.
///
/// Returns `false` when a subscriber was already installed; calling it more
/// than once is harmless.
pub fn init(default_filter: &str) -> bool {
    // Fails when another logger already owns the `log` facade.
    let _ = tracing_log::LogTracer::init();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true));
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
