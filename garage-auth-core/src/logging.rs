//! Structured logging setup
//!
//! Security events are emitted on the `audit` target so they can be routed
//! or filtered separately (`RUST_LOG=audit=info,warn`).

use crate::config::LoggingSettings;
use anyhow::{anyhow, Result};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Normalize a configured level into a filter directive
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&settings.level)));

    let subscriber = Registry::default().with(env_filter);

    if settings.json {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true);

        subscriber
            .with(json_layer)
            .try_init()
            .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .compact();

        subscriber
            .with(fmt_layer)
            .try_init()
            .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;
    }

    tracing::debug!(
        "Logging initialized: level={}, json={}",
        settings.level,
        settings.json
    );
    Ok(())
}
