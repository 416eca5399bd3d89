use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use crate::types::AccountId;

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,
    pub json: bool,
    /// File that receives error-level events only. `None` disables the sink.
    pub error_log_path: Option<PathBuf>,
}

/// Install console logging plus an error-only file sink.
pub fn init_telemetry(settings: &TelemetrySettings) -> Result<()> {
    let error_sink = match &settings.error_log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open error log {}", path.display()))?;
            Some(error_log_layer(file))
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .context("Invalid log level directive")?;

    let console = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };

    tracing_subscriber::registry()
        .with(console.with_filter(env_filter))
        .with(error_sink)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!("Account mover telemetry initialized");
    Ok(())
}

/// Plain-text layer writing ERROR events to `file`.
///
/// Spans of every level pass the filter so each line carries its
/// `account_migration{account.id=..}` context.
pub fn error_log_layer<S>(file: File) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .with_filter(filter_fn(|metadata| {
            metadata.is_span() || *metadata.level() <= Level::ERROR
        }))
}

/// Generate a correlation ID for linking the accounts of one run
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping all work done for a single account
pub fn create_migration_span(account_id: &AccountId, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "account_migration",
        account.id = %account_id,
        correlation.id = correlation_id,
    )
}

pub fn shutdown_telemetry() {
    tracing::debug!("Account mover telemetry shutdown complete");
}
