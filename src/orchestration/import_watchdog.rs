//! # Import Watchdog
//!
//! Times out imports that stayed active longer than the configured limit. The
//! watchdog is the only writer of the `timeout` status; once set, the dispatch
//! loop treats the import as terminal and stops re-enqueueing it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::constants::status_groups::IMPORT_ACTIVE;
use crate::error::{MigrationError, MigrationResult};
use crate::logging::log_import_operation;
use crate::state_machine::{ImportEvent, ImportStateMachine};
use crate::store::MigrationStore;

pub struct ImportWatchdog {
    store: Arc<dyn MigrationStore>,
    timeout: chrono::Duration,
}

impl ImportWatchdog {
    pub fn new(store: Arc<dyn MigrationStore>, timeout: Duration) -> MigrationResult<Self> {
        let timeout = chrono::Duration::from_std(timeout)
            .map_err(|e| MigrationError::ConfigurationError(format!("import timeout: {e}")))?;

        Ok(Self { store, timeout })
    }

    /// Time out every active import created at or before `now - timeout`.
    ///
    /// Returns the ids that were actually transitioned.
    pub async fn sweep(&self, now: DateTime<Utc>) -> MigrationResult<Vec<i64>> {
        let deadline = now - self.timeout;
        let mut timed_out = Vec::new();

        for import in self.store.imports_with_status(&IMPORT_ACTIVE).await? {
            if import.created_at > deadline {
                continue;
            }

            let applied = ImportStateMachine::new(import.id, self.store.clone())
                .transition(ImportEvent::TimeOut)
                .await?;

            if applied {
                log_import_operation(
                    "time_out",
                    import.id,
                    "timeout",
                    Some(&format!("created_at={}", import.created_at.to_rfc3339())),
                );
                timed_out.push(import.id);
            }
        }

        if !timed_out.is_empty() {
            info!(count = timed_out.len(), imports = ?timed_out, "Imports timed out");
        }

        Ok(timed_out)
    }
}
