//! Tracing setup for tests.
//!
//! `RUST_LOG` selects the filter (default `warn`). Output goes through the
//! test writer, so it is captured per test and shown only on failure.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install a global subscriber. Safe to call from every test; only the first
/// call has an effect.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer().with_target(true))
        .try_init();
}
