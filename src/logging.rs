//! Diagnostic output for the command-line tool.
//!
//! The level is read from `SITTAGGER_LOG` using the usual `EnvFilter`
//! directives, for example `SITTAGGER_LOG=debug` or
//! `SITTAGGER_LOG=sittagger::storage=info`. Without it only warnings and
//! errors are printed.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "SITTAGGER_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs a stderr subscriber. Only the first call has an effect.
pub fn init() {
    // stdout carries command output and must stay parseable.
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
