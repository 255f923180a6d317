//! # Process Service
//!
//! The dispatch loop for one import. Stateless: every pass re-reads persisted
//! state, does a bounded amount of work and re-enqueues itself.
//!
//! ## Pass
//!
//! 1. Load the import; missing or terminal imports end the pass silently.
//! 2. Move a `created` import to `started`.
//! 3. If the import already has `batch_size` started entities, re-enqueue
//!    after `perform_delay` and stop.
//! 4. Promote up to `batch_size - started` created entities in creation
//!    order: materialize trackers, start the entity, enqueue entity work and,
//!    for projects, an export request.
//! 5. Settle the import if every entity is terminal; otherwise re-enqueue.
//!
//! Any error in steps 2–5 fails the import, is handed to the
//! [`ErrorReporter`] with the import id, and is not propagated.
//!
//! Slot accounting is enforced inside [`MigrationStore::promote_entity`], so
//! two passes racing for the same import can never exceed the ceiling.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::error_reporting::ErrorReporter;
use super::import_finalizer::{FinalizationAction, ImportFinalizer};
use super::tracker_materializer::TrackerMaterializer;
use crate::config::DispatchSettings;
use crate::constants::messages;
use crate::error::{MigrationError, MigrationResult};
use crate::logging::{log_entity_operation, log_import_operation};
use crate::messaging::{EntityExportRequest, JobScheduler};
use crate::models::{Entity, Import};
use crate::state_machine::{ImportEvent, ImportState, ImportStateMachine};
use crate::store::{MigrationStore, PromotionOutcome};

/// What one pass of the loop did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessOutcome {
    NotFound,
    AlreadyTerminal,
    /// Ceiling reached; re-enqueued without promoting
    Backpressure { started: usize },
    /// Entities promoted (possibly zero); re-enqueued
    Dispatched { promoted: usize },
    Finished,
    Failed,
    /// A dispatch error failed the import
    Aborted { reason: String },
}

impl ProcessOutcome {
    /// Whether this pass scheduled another one
    pub fn reenqueued(&self) -> bool {
        matches!(self, Self::Backpressure { .. } | Self::Dispatched { .. })
    }
}

pub struct ProcessService {
    store: Arc<dyn MigrationStore>,
    scheduler: Arc<dyn JobScheduler>,
    materializer: TrackerMaterializer,
    finalizer: ImportFinalizer,
    reporter: Arc<dyn ErrorReporter>,
    batch_size: usize,
    perform_delay: Duration,
}

impl ProcessService {
    pub fn new(
        store: Arc<dyn MigrationStore>,
        scheduler: Arc<dyn JobScheduler>,
        materializer: TrackerMaterializer,
        reporter: Arc<dyn ErrorReporter>,
        settings: &DispatchSettings,
    ) -> Self {
        Self {
            finalizer: ImportFinalizer::new(store.clone()),
            store,
            scheduler,
            materializer,
            reporter,
            batch_size: settings.batch_size,
            perform_delay: settings.perform_delay(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn perform_delay(&self) -> Duration {
        self.perform_delay
    }

    /// Run one pass for `import_id`. Never returns an error.
    pub async fn process(&self, import_id: i64) -> ProcessOutcome {
        match self.try_process(import_id).await {
            Ok(outcome) => {
                debug!(import_id = import_id, outcome = ?outcome, "Dispatch pass complete");
                outcome
            }
            Err(error) => self.abort(import_id, error).await,
        }
    }

    async fn try_process(&self, import_id: i64) -> MigrationResult<ProcessOutcome> {
        let Some(import) = self.store.find_import(import_id).await? else {
            debug!(import_id = import_id, "Import not found - nothing to dispatch");
            return Ok(ProcessOutcome::NotFound);
        };

        if import.is_terminal() {
            debug!(
                import_id = import_id,
                status = %import.status,
                "Import already terminal - nothing to dispatch"
            );
            return Ok(ProcessOutcome::AlreadyTerminal);
        }

        if import.status == ImportState::Created {
            let started = ImportStateMachine::new(import_id, self.store.clone())
                .transition(ImportEvent::Start)
                .await?;
            if started {
                log_import_operation("start", import_id, "started", None);
            }
        }

        let started_count = self.store.started_entity_count(import_id).await?;
        if started_count >= self.batch_size {
            debug!(
                import_id = import_id,
                started = started_count,
                batch_size = self.batch_size,
                "Entity ceiling reached - backing off"
            );
            self.reenqueue(import_id).await?;
            return Ok(ProcessOutcome::Backpressure {
                started: started_count,
            });
        }

        let slots = self.batch_size - started_count;
        let candidates = self.store.created_entities(import_id, slots).await?;
        let mut promoted = 0;

        for entity in &candidates {
            match self.promote(&import, entity).await? {
                PromotionOutcome::Promoted(_) => promoted += 1,
                PromotionOutcome::AtCapacity => break,
                PromotionOutcome::NotClaimable(_) => continue,
            }
        }

        match self.finalizer.finalize(import_id).await? {
            FinalizationAction::Finished => Ok(ProcessOutcome::Finished),
            FinalizationAction::Failed => Ok(ProcessOutcome::Failed),
            FinalizationAction::Unchanged => Ok(ProcessOutcome::AlreadyTerminal),
            FinalizationAction::Pending => {
                self.reenqueue(import_id).await?;
                Ok(ProcessOutcome::Dispatched { promoted })
            }
        }
    }

    /// Start one entity unless another pass claimed it or its slot
    async fn promote(&self, import: &Import, entity: &Entity) -> MigrationResult<PromotionOutcome> {
        let plan = self.materializer.plan(import, entity);
        let tracker_count = plan.trackers.len();

        let outcome = self
            .store
            .promote_entity(entity.id, self.batch_size, plan.trackers.clone())
            .await?;

        match &outcome {
            PromotionOutcome::Promoted(_) => {
                self.materializer.report_skipped(&plan);

                self.scheduler.enqueue_entity(entity.id).await?;
                if entity.is_project() {
                    self.scheduler
                        .enqueue_export_request(EntityExportRequest::from(entity))
                        .await?;
                }

                log_entity_operation(
                    "promote",
                    Some(entity.import_id),
                    entity.id,
                    Some(&entity.source_full_path),
                    "started",
                    Some(&format!(
                        "trackers={tracker_count} skipped={}",
                        plan.skipped.len()
                    )),
                );
            }
            PromotionOutcome::AtCapacity => {
                debug!(entity_id = entity.id, "No free slot for entity");
            }
            PromotionOutcome::NotClaimable(status) => {
                debug!(
                    entity_id = entity.id,
                    status = ?status,
                    "Entity no longer claimable"
                );
            }
        }

        Ok(outcome)
    }

    async fn reenqueue(&self, import_id: i64) -> MigrationResult<()> {
        self.scheduler
            .enqueue_import(import_id, self.perform_delay)
            .await?;
        Ok(())
    }

    async fn abort(&self, import_id: i64, error: MigrationError) -> ProcessOutcome {
        error!(
            import_id = import_id,
            error = %error,
            "{}",
            messages::IMPORT_FAILED
        );
        self.reporter.track_exception(&error, import_id);

        let reason = error.to_string();
        match ImportStateMachine::new(import_id, self.store.clone())
            .transition(ImportEvent::fail_with_error(reason.clone()))
            .await
        {
            Ok(true) => log_import_operation("fail", import_id, "failed", Some(&reason)),
            Ok(false) => debug!(
                import_id = import_id,
                "Import left the active states before it could be failed"
            ),
            Err(fail_error) => error!(
                import_id = import_id,
                error = %fail_error,
                "Could not mark import as failed"
            ),
        }

        info!(import_id = import_id, reason = %reason, "Dispatch aborted");
        ProcessOutcome::Aborted { reason }
    }
}
