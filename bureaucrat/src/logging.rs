//! Tracing setup for processes that use this crate.
//!
//! Diagnostics (warnings about odd names, failed backups, task outcomes) are
//! emitted as `tracing` events. They are separate from the marker and report
//! files, which are written regardless of `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
///
/// # Example
/// ```bash
/// RUST_LOG=bureaucrat=debug cargo test -- --nocapture
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
