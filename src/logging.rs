//! # Structured Logging Module
//!
//! Environment-aware structured logging for the dispatch loop, entity workers
//! and export dispatcher. Console output is always installed; set
//! `MIGRATION_LOG_FORMAT=json` to emit JSON lines instead.

use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let json = use_json_format();

        let console_layer = (!json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(build_filter(&environment))
        });

        let json_layer = json.then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(build_filter(&environment))
        });

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(json_layer);

        // A subscriber installed by the host process takes precedence
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            json = json,
            "Structured logging initialized"
        );
    });
}

/// `RUST_LOG` wins; otherwise the level follows the environment
fn build_filter(environment: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(get_log_level(environment)))
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("MIGRATION_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn use_json_format() -> bool {
    std::env::var("MIGRATION_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for import operations
pub fn log_import_operation(
    operation: &str,
    import_id: i64,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        import_id = import_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "IMPORT_OPERATION"
    );
}

/// Log structured data for entity operations
pub fn log_entity_operation(
    operation: &str,
    import_id: Option<i64>,
    entity_id: i64,
    source_full_path: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        import_id = import_id,
        entity_id = entity_id,
        source_full_path = source_full_path,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "ENTITY_OPERATION"
    );
}

/// Log structured data for tracker operations
pub fn log_tracker_operation(
    operation: &str,
    entity_id: i64,
    tracker_id: Option<i64>,
    relation: &str,
    stage: u32,
    status: &str,
) {
    tracing::info!(
        operation = %operation,
        entity_id = entity_id,
        tracker_id = tracker_id,
        relation = %relation,
        stage = stage,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "TRACKER_OPERATION"
    );
}

/// Log structured data for relation export operations
pub fn log_export_operation(
    operation: &str,
    portable: &str,
    relation: &str,
    mode: Option<&str>,
    status: &str,
) {
    tracing::info!(
        operation = %operation,
        portable = %portable,
        relation = %relation,
        mode = mode,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "EXPORT_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
