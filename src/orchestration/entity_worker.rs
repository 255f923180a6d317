//! # Entity Worker
//!
//! Advances the trackers of one started entity, one stage per pass.
//!
//! ## Overview
//!
//! Each pass picks the lowest stage that still has non-terminal trackers,
//! claims every `created` tracker in it, and runs their pipelines
//! concurrently. Trackers of a later stage are never touched while an earlier
//! stage is unfinished. When every tracker is terminal the entity is settled:
//! `failed` if any tracker failed, otherwise `finished`.
//!
//! The worker re-enqueues itself while work remains. If a pass found nothing
//! to claim (another worker holds the stage) the re-enqueue is delayed.
//!
//! ## Abandoned trackers
//!
//! A tracker whose worker died stays `started`. Once its last status change is
//! older than the stale threshold the next pass fails it, so the stage can
//! settle and the entity completes instead of waiting for the import timeout.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::{PipelineContext, StageCatalog};
use crate::constants::DEFAULT_STALE_TRACKER_AFTER;
use crate::error::MigrationResult;
use crate::logging::{log_entity_operation, log_tracker_operation};
use crate::messaging::{JobScheduler, MigrationJob, ScheduledJob};
use crate::models::{current_stage, Entity, Tracker};
use crate::state_machine::{
    completion_state, EntityEvent, EntityState, EntityStateMachine, TrackerEvent, TrackerState,
    TrackerStateMachine,
};
use crate::store::MigrationStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRunOutcome {
    NotFound,
    /// Entity is not `started`; nothing to do
    Inactive(EntityState),
    /// Ran the pipelines of `stage`; more work remains
    Advanced { stage: u32, ran: usize },
    /// Entity reached a terminal status
    Completed(EntityState),
}

pub struct EntityWorker {
    store: Arc<dyn MigrationStore>,
    scheduler: Arc<dyn JobScheduler>,
    catalog: Arc<StageCatalog>,
    retry_delay: Duration,
    stale_after: Duration,
}

impl EntityWorker {
    pub fn new(
        store: Arc<dyn MigrationStore>,
        scheduler: Arc<dyn JobScheduler>,
        catalog: Arc<StageCatalog>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            store,
            scheduler,
            catalog,
            retry_delay,
            stale_after: DEFAULT_STALE_TRACKER_AFTER,
        }
    }

    /// Age after which a `started` tracker is failed as abandoned
    pub fn with_stale_tracker_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub async fn perform(&self, entity_id: i64) -> MigrationResult<EntityRunOutcome> {
        let Some(entity) = self.store.find_entity(entity_id).await? else {
            return Ok(EntityRunOutcome::NotFound);
        };

        if entity.status != EntityState::Started {
            debug!(entity_id = entity_id, status = %entity.status, "Entity not started - skipping");
            return Ok(EntityRunOutcome::Inactive(entity.status));
        }

        let import = self.store.find_import(entity.import_id).await?;
        let source_version = match import {
            Some(import) if !import.is_terminal() => import.source_version,
            other => {
                let reason = match other {
                    Some(import) => format!("import is {}", import.status),
                    None => "import no longer exists".to_string(),
                };
                return self.settle(&entity, EntityEvent::fail_with_error(reason)).await;
            }
        };

        let trackers = self.store.trackers_for_entity(entity_id).await?;
        let Some(stage) = current_stage(&trackers) else {
            return self.complete(&entity, &trackers).await;
        };

        let abandoned = self
            .fail_abandoned(&entity, stage, &trackers, Utc::now())
            .await?;

        let runnable: Vec<&Tracker> = trackers
            .iter()
            .filter(|tracker| tracker.stage == stage && tracker.status == TrackerState::Created)
            .collect();

        let results = join_all(
            runnable
                .into_iter()
                .map(|tracker| self.run_tracker(&entity, tracker, source_version.clone())),
        )
        .await;

        let mut ran = 0;
        for result in results {
            if result? {
                ran += 1;
            }
        }

        let trackers = self.store.trackers_for_entity(entity_id).await?;
        if current_stage(&trackers).is_none() {
            return self.complete(&entity, &trackers).await;
        }

        let delay = if ran > 0 || abandoned > 0 {
            Duration::ZERO
        } else {
            self.retry_delay
        };
        self.scheduler
            .schedule(ScheduledJob::delayed(
                MigrationJob::RunEntity { entity_id },
                delay,
            ))
            .await?;

        Ok(EntityRunOutcome::Advanced { stage, ran })
    }

    /// Fail the `started` trackers of `stage` whose last change predates the
    /// stale threshold; returns how many were failed
    async fn fail_abandoned(
        &self,
        entity: &Entity,
        stage: u32,
        trackers: &[Tracker],
        now: DateTime<Utc>,
    ) -> MigrationResult<usize> {
        let Ok(stale_after) = chrono::Duration::from_std(self.stale_after) else {
            return Ok(0);
        };
        let cutoff = now - stale_after;

        let mut failed = 0;
        for tracker in trackers.iter().filter(|tracker| {
            tracker.stage == stage
                && tracker.status == TrackerState::Started
                && tracker.updated_at <= cutoff
        }) {
            let applied = TrackerStateMachine::new(tracker.id, self.store.clone())
                .transition(TrackerEvent::fail_with_error(format!(
                    "Abandoned: started at {} with no progress",
                    tracker.updated_at.to_rfc3339()
                )))
                .await?;

            if applied {
                warn!(
                    entity_id = entity.id,
                    tracker_id = tracker.id,
                    relation = %tracker.relation,
                    started_at = %tracker.updated_at.to_rfc3339(),
                    "Failing abandoned tracker"
                );
                log_tracker_operation(
                    "abandon",
                    entity.id,
                    Some(tracker.id),
                    &tracker.relation,
                    tracker.stage,
                    TrackerState::Failed.as_str(),
                );
                failed += 1;
            }
        }

        Ok(failed)
    }

    /// Claim and run one tracker; `false` when another worker claimed it first
    async fn run_tracker(
        &self,
        entity: &Entity,
        tracker: &Tracker,
        source_version: Option<String>,
    ) -> MigrationResult<bool> {
        let machine = TrackerStateMachine::new(tracker.id, self.store.clone());
        if !machine.transition(TrackerEvent::Start).await? {
            return Ok(false);
        }

        log_tracker_operation(
            "run",
            entity.id,
            Some(tracker.id),
            &tracker.relation,
            tracker.stage,
            "started",
        );

        let event = match self.catalog.find(entity.source_type, &tracker.relation) {
            Some(entry) => {
                let context = PipelineContext {
                    entity: entity.clone(),
                    tracker: tracker.clone(),
                    source_version,
                };
                match entry.pipeline.run(&context).await {
                    Ok(()) => TrackerEvent::Finish,
                    Err(error) => {
                        warn!(
                            entity_id = entity.id,
                            tracker_id = tracker.id,
                            relation = %tracker.relation,
                            error = %error,
                            "Pipeline failed"
                        );
                        TrackerEvent::fail_with_error(error.to_string())
                    }
                }
            }
            None => TrackerEvent::fail_with_error(format!(
                "Pipeline '{}' is not in the stage catalog",
                tracker.relation
            )),
        };

        let status = event.target_state();
        machine.transition(event).await?;
        log_tracker_operation(
            "run",
            entity.id,
            Some(tracker.id),
            &tracker.relation,
            tracker.stage,
            status.as_str(),
        );

        Ok(true)
    }

    async fn complete(
        &self,
        entity: &Entity,
        trackers: &[Tracker],
    ) -> MigrationResult<EntityRunOutcome> {
        let statuses: Vec<TrackerState> = trackers.iter().map(|tracker| tracker.status).collect();

        let event = match completion_state(&statuses) {
            Some(EntityState::Failed) => {
                EntityEvent::fail_with_error("One or more pipelines failed")
            }
            _ => EntityEvent::Finish,
        };

        self.settle(entity, event).await
    }

    async fn settle(&self, entity: &Entity, event: EntityEvent) -> MigrationResult<EntityRunOutcome> {
        let target = event.target_state();
        let reason = event.error_message().map(ToString::to_string);

        let applied = EntityStateMachine::new(entity.id, self.store.clone())
            .transition(event)
            .await?;

        if !applied {
            let current = self
                .store
                .find_entity(entity.id)
                .await?
                .map(|entity| entity.status)
                .unwrap_or(target);
            return Ok(EntityRunOutcome::Inactive(current));
        }

        log_entity_operation(
            "complete",
            Some(entity.import_id),
            entity.id,
            Some(&entity.source_full_path),
            target.as_str(),
            reason.as_deref(),
        );

        Ok(EntityRunOutcome::Completed(target))
    }
}
