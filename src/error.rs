//! Error types for the migration core.
//!

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigurationError;
use crate::export::ExportError;
use crate::messaging::MessagingError;
use crate::state_machine::errors::StateMachineError;
use crate::versioning::VersionError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Orchestration error: {0}")]
    OrchestrationError(String),
    #[error("Messaging error: {0}")]
    MessagingError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Catalog error: {0}")]
    CatalogError(String),
    #[error("Invalid version format: {0}")]
    InvalidVersionFormat(String),
    #[error("Pipeline {relation} failed: {reason}")]
    PipelineError { relation: String, reason: String },
    #[error("Export error: {0}")]
    ExportError(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        MigrationError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for MigrationError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        MigrationError::DatabaseError(format!("migration failed: {err}"))
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        MigrationError::Internal(format!("JSON serialization error: {err}"))
    }
}

impl From<MessagingError> for MigrationError {
    fn from(err: MessagingError) -> Self {
        MigrationError::MessagingError(err.to_string())
    }
}

impl From<StateMachineError> for MigrationError {
    fn from(err: StateMachineError) -> Self {
        MigrationError::StateTransitionError(err.to_string())
    }
}

impl From<ConfigurationError> for MigrationError {
    fn from(err: ConfigurationError) -> Self {
        MigrationError::ConfigurationError(err.to_string())
    }
}

impl From<CatalogError> for MigrationError {
    fn from(err: CatalogError) -> Self {
        MigrationError::CatalogError(err.to_string())
    }
}

impl From<VersionError> for MigrationError {
    fn from(err: VersionError) -> Self {
        match err {
            VersionError::InvalidVersionFormat(raw) => MigrationError::InvalidVersionFormat(raw),
        }
    }
}

impl From<ExportError> for MigrationError {
    fn from(err: ExportError) -> Self {
        MigrationError::ExportError(err.to_string())
    }
}

pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_error_keeps_raw_input() {
        let err: MigrationError = VersionError::InvalidVersionFormat("abc".to_string()).into();
        assert_eq!(err, MigrationError::InvalidVersionFormat("abc".to_string()));
        assert_eq!(err.to_string(), "Invalid version format: abc");
    }

    #[test]
    fn test_messaging_error_display() {
        let err: MigrationError = MessagingError::ChannelClosed.into();
        assert!(err.to_string().starts_with("Messaging error:"));
    }
}
