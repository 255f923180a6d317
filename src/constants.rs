//! # System Constants
//!
//! Default tuning values and shared string keys for the migration core.
//! Every tuning value here is only a default; the live values come from
//! [`crate::config::MigrationConfig`].

use std::time::Duration;

/// Default ceiling on entities simultaneously `started` per import
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default delay before the dispatch loop runs again for the same import
pub const DEFAULT_PERFORM_DELAY: Duration = Duration::from_secs(5);

/// Default lifetime of a relation export lease
pub const DEFAULT_EXPORT_LEASE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default age after which a `started` tracker is treated as abandoned
pub const DEFAULT_STALE_TRACKER_AFTER: Duration = Duration::from_secs(4 * 60 * 60);

/// Default age after which an unfinished import is timed out
pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Importer name attached to diagnostic records
pub const IMPORTER_NAME: &str = "gitlab_migration";

/// Messages used for structured log records that operators search for
pub mod messages {
    pub const PIPELINE_SKIPPED: &str =
        "Pipeline skipped as source instance version not compatible with pipeline";
    pub const IMPORT_FAILED: &str = "Import failed while dispatching entities";
}

/// Groupings of statuses used in aggregate queries
pub mod status_groups {
    use crate::state_machine::{EntityState, ImportState, TrackerState};

    pub const IMPORT_TERMINAL: [ImportState; 3] = [
        ImportState::Finished,
        ImportState::Failed,
        ImportState::Timeout,
    ];

    pub const IMPORT_ACTIVE: [ImportState; 2] = [ImportState::Created, ImportState::Started];

    pub const ENTITY_TERMINAL: [EntityState; 3] = [
        EntityState::Finished,
        EntityState::Failed,
        EntityState::Skipped,
    ];

    pub const TRACKER_TERMINAL: [TrackerState; 3] = [
        TrackerState::Finished,
        TrackerState::Failed,
        TrackerState::Skipped,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_groups_agree_with_state_predicates() {
        assert!(status_groups::IMPORT_TERMINAL.iter().all(|s| s.is_terminal()));
        assert!(status_groups::IMPORT_ACTIVE.iter().all(|s| !s.is_terminal()));
        assert!(status_groups::ENTITY_TERMINAL.iter().all(|s| s.is_terminal()));
        assert!(status_groups::TRACKER_TERMINAL.iter().all(|s| s.is_terminal()));
    }
}
