//! `tracing` subscriber bootstrap for apps embedding the library.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (for example `"cloudnet=debug"`).
///
/// Returns `false` when a global subscriber is already set.
pub fn init(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
