use crate::error::MigrationError;
use crate::logging::log_error;

/// Receives dispatch failures that were swallowed to keep the loop alive
pub trait ErrorReporter: Send + Sync {
    fn track_exception(&self, error: &MigrationError, import_id: i64);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn track_exception(&self, error: &MigrationError, import_id: i64) {
        log_error(
            "process_service",
            "process",
            &error.to_string(),
            Some(&format!("bulk_import_id={import_id}")),
        );
    }
}
