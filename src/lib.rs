//! Sigsmith: signature decipher extraction for player scripts.
//!
//! Structural matching over ESTree syntax trees, a bounded preprocessing
//! worker pool, and layered caches keyed by BLAKE3 digests.

pub mod cache;
pub mod cli;
pub mod core;
pub mod extract;
pub mod matcher;
pub mod pool;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for diagnostic output on stderr.
///
/// Safe to call multiple times. Enable with `RUST_LOG=sigsmith=debug`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}
