//! # Import Finalizer
//!
//! Derives the terminal import status from its entities once none of them is
//! pending.
//!
//! | Entities                               | Action     |
//! |----------------------------------------|------------|
//! | none, or any created/started           | `Pending`  |
//! | all terminal, at least one finished    | `Finished` |
//! | all terminal, none finished            | `Failed`   |

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::MigrationResult;
use crate::logging::log_import_operation;
use crate::models::EntityStatusSummary;
use crate::state_machine::{ImportEvent, ImportStateMachine};
use crate::store::MigrationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizationAction {
    Finished,
    Failed,
    /// Entities still in flight (or none exist yet)
    Pending,
    /// The import left `started` before we could settle it
    Unchanged,
}

#[derive(Clone)]
pub struct ImportFinalizer {
    store: Arc<dyn MigrationStore>,
}

impl ImportFinalizer {
    pub fn new(store: Arc<dyn MigrationStore>) -> Self {
        Self { store }
    }

    /// Event implied by the entity summary, if the import can be settled
    pub fn decide(summary: &EntityStatusSummary) -> Option<ImportEvent> {
        if !summary.all_terminal() {
            return None;
        }

        if summary.finished > 0 {
            Some(ImportEvent::Finish)
        } else {
            Some(ImportEvent::fail_with_error("No entity finished"))
        }
    }

    pub async fn finalize(&self, import_id: i64) -> MigrationResult<FinalizationAction> {
        let summary = self.store.entity_status_summary(import_id).await?;

        let Some(event) = Self::decide(&summary) else {
            return Ok(FinalizationAction::Pending);
        };

        let action = match event {
            ImportEvent::Finish => FinalizationAction::Finished,
            _ => FinalizationAction::Failed,
        };

        let applied = ImportStateMachine::new(import_id, self.store.clone())
            .transition(event)
            .await?;

        if !applied {
            return Ok(FinalizationAction::Unchanged);
        }

        info!(
            import_id = import_id,
            finished = summary.finished,
            failed = summary.failed,
            skipped = summary.skipped,
            action = ?action,
            "Import finalized"
        );
        log_import_operation(
            "finalize",
            import_id,
            if action == FinalizationAction::Finished {
                "finished"
            } else {
                "failed"
            },
            None,
        );

        Ok(action)
    }
}
