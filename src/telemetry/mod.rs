//! Tracing initialization for host applications and tests.
//!
//! The client logs through the `tracing` facade everywhere; embedding
//! applications that already install a subscriber can ignore this module.
//! Filtering follows `RUST_LOG`, defaulting to `info`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a formatted `tracing` subscriber. Returns quietly when one is
/// already installed, so tests can call it repeatedly.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
