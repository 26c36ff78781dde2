//! Process-wide logging setup.
//!
//! Library code logs through the `log` facade and opens `tracing` spans;
//! [`init`] routes both into a single `tracing-subscriber` formatter.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format for [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Installs the global subscriber. `RUST_LOG` overrides `default_level`.
/// Calling it more than once is a no-op.
pub fn init(default_level: &str, format: LogFormat) {
    INITIALIZED.get_or_init(|| {
        // Fails only if another `log` logger is already installed.
        let _ = tracing_log::LogTracer::init();

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));
        let registry = tracing_subscriber::registry().with(filter);

        let result = match format {
            LogFormat::Pretty => {
                tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(true)))
            }
            LogFormat::Json => tracing::subscriber::set_global_default(registry.with(fmt::layer().json())),
        };
        if let Err(e) = result {
            eprintln!("stockmeta: logging already initialized: {}", e);
        }
    });
}
