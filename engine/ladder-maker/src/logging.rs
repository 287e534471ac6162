//! Logging and tracing setup

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, prelude::*, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn initialize_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let fmt_layer = match config.format.as_str() {
        "json" => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        _ => fmt::layer()
            .pretty()
            .with_target(false)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
