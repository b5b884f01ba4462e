pub mod config;
pub mod document;
mod error;
pub mod fleet;
pub mod matcher;
pub mod paths;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod synthesize;
pub mod watcher;

pub use error::{ReconcileError, Result};
pub use pipeline::{Pipeline, ProcessOutcome};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (from the config) is used.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}
