//! # Migration Store
//!
//! Persistence boundary for imports, entities and trackers.
//!
//! ## Overview
//!
//! Every mutation exposed here is a single-record status change guarded by an
//! allowed-predecessor check (`compare_and_set_*`). A stale writer gets `false`
//! back instead of overwriting newer state. The one multi-record write is
//! [`MigrationStore::promote_entity`], which claims a dispatch slot, starts the
//! entity and materializes its trackers atomically.
//!
//! ## Implementations
//!
//! - [`InMemoryMigrationStore`]: single-lock store for tests and embedding
//! - [`PgMigrationStore`]: PostgreSQL via SQLx

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MigrationResult;
use crate::models::{
    Entity, EntityStatusSummary, Import, NewEntity, NewImport, NewTracker, Tracker,
};
use crate::state_machine::{EntityState, ImportState, TrackerState};

pub use in_memory::InMemoryMigrationStore;
pub use postgres::PgMigrationStore;

/// Result of an attempt to move an entity from `created` to `started`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PromotionOutcome {
    /// Entity started; trackers returned in stage order
    Promoted(Vec<Tracker>),
    /// The import already has `ceiling` started entities
    AtCapacity,
    /// Entity missing (`None`) or no longer `created`
    NotClaimable(Option<EntityState>),
}

impl PromotionOutcome {
    pub fn is_promoted(&self) -> bool {
        matches!(self, Self::Promoted(_))
    }
}

#[async_trait]
pub trait MigrationStore: Send + Sync {
    async fn create_import(&self, new_import: NewImport) -> MigrationResult<Import>;

    async fn find_import(&self, import_id: i64) -> MigrationResult<Option<Import>>;

    /// Imports whose status is one of `statuses`, oldest first
    async fn imports_with_status(&self, statuses: &[ImportState]) -> MigrationResult<Vec<Import>>;

    /// Set the import status only if the current status is in `allowed_from`
    async fn compare_and_set_import_status(
        &self,
        import_id: i64,
        allowed_from: &[ImportState],
        to: ImportState,
    ) -> MigrationResult<bool>;

    async fn create_entity(&self, new_entity: NewEntity) -> MigrationResult<Entity>;

    async fn find_entity(&self, entity_id: i64) -> MigrationResult<Option<Entity>>;

    async fn entity_status_summary(&self, import_id: i64) -> MigrationResult<EntityStatusSummary>;

    async fn started_entity_count(&self, import_id: i64) -> MigrationResult<usize> {
        Ok(self.entity_status_summary(import_id).await?.started)
    }

    /// Up to `limit` entities still `created`, in creation order
    async fn created_entities(&self, import_id: i64, limit: usize) -> MigrationResult<Vec<Entity>>;

    /// Entities currently `started`, in creation order
    async fn started_entities(&self, import_id: i64) -> MigrationResult<Vec<Entity>>;

    async fn compare_and_set_entity_status(
        &self,
        entity_id: i64,
        allowed_from: &[EntityState],
        to: EntityState,
    ) -> MigrationResult<bool>;

    /// Atomically claim a dispatch slot, start the entity and insert its trackers.
    ///
    /// Fails over to [`PromotionOutcome::AtCapacity`] when the owning import
    /// already has `ceiling` started entities, and to
    /// [`PromotionOutcome::NotClaimable`] when the entity is not `created`. In
    /// both cases nothing is written.
    async fn promote_entity(
        &self,
        entity_id: i64,
        ceiling: usize,
        trackers: Vec<NewTracker>,
    ) -> MigrationResult<PromotionOutcome>;

    /// Trackers of an entity ordered by `(stage, id)`
    async fn trackers_for_entity(&self, entity_id: i64) -> MigrationResult<Vec<Tracker>>;

    async fn find_tracker(&self, tracker_id: i64) -> MigrationResult<Option<Tracker>>;

    async fn compare_and_set_tracker_status(
        &self,
        tracker_id: i64,
        allowed_from: &[TrackerState],
        to: TrackerState,
    ) -> MigrationResult<bool>;
}
