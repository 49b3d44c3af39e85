//! Logging configuration and initialization
//!
//! Provides structured logging with tracing-subscriber and optional JSON output

use crate::settings::RuntimeSettings;
use anyhow::{Context, Result};
use std::str::FromStr;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging from `RUST_LOG` and `ACTIONHUB_JSON_LOGS`
pub fn init() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let json_logs = std::env::var("ACTIONHUB_JSON_LOGS")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    init_with_config(&log_level, json_logs)
}

pub fn init_from_settings(settings: &RuntimeSettings) -> Result<()> {
    init_with_config(&settings.log_level, settings.json_logs)
}

/// Initialize logging with custom configuration
pub fn init_with_config(log_level: &str, json_logs: bool) -> Result<()> {
    let env_filter = EnvFilter::from_str(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_level(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .context("a global tracing subscriber is already installed")?;
    } else {
        registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_level(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .context("a global tracing subscriber is already installed")?;
    }

    tracing::info!(log_level = %log_level, json_logs = %json_logs, "Logging initialized");

    Ok(())
}

