pub mod config;
pub mod models;
pub mod reasoning;
pub mod sources;

use tracing_subscriber::EnvFilter;

pub use reasoning::{AnalysisEngine, DefaultAnalysisEngine, ReasoningError};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
