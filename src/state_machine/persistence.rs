//! # State Machine Persistence Layer
//!
//! Bridges the state machines to the [`MigrationStore`]. Rather than holding
//! SQL of its own, each persistence type delegates to the store's
//! compare-and-set operations:
//!
//! - **ImportTransitionPersistence** → `compare_and_set_import_status`
//! - **EntityTransitionPersistence** → `compare_and_set_entity_status`
//! - **TrackerTransitionPersistence** → `compare_and_set_tracker_status`
//!
//! A `false` result means the record's current status was not an allowed
//! predecessor (or the record is gone); nothing was written.

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::{PersistenceError, PersistenceResult};
use super::states::{EntityState, ImportState, TrackerState};
use crate::store::MigrationStore;

/// Trait for persisting state transitions of one record kind
#[async_trait]
pub trait TransitionPersistence<S>: Send + Sync {
    /// Apply `to` only if the current status is in `allowed_from`
    async fn persist_transition(
        &self,
        record_id: i64,
        allowed_from: &[S],
        to: S,
    ) -> PersistenceResult<bool>;

    /// Resolve the current status; `None` when the record does not exist
    async fn resolve_current_state(&self, record_id: i64) -> PersistenceResult<Option<S>>;
}

#[derive(Clone)]
pub struct ImportTransitionPersistence {
    store: Arc<dyn MigrationStore>,
}

impl ImportTransitionPersistence {
    pub fn new(store: Arc<dyn MigrationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TransitionPersistence<ImportState> for ImportTransitionPersistence {
    async fn persist_transition(
        &self,
        import_id: i64,
        allowed_from: &[ImportState],
        to: ImportState,
    ) -> PersistenceResult<bool> {
        self.store
            .compare_and_set_import_status(import_id, allowed_from, to)
            .await
            .map_err(|e| PersistenceError::compare_and_set("import", import_id, to, e))
    }

    async fn resolve_current_state(&self, import_id: i64) -> PersistenceResult<Option<ImportState>> {
        self.store
            .find_import(import_id)
            .await
            .map(|import| import.map(|i| i.status))
            .map_err(|e| PersistenceError::lookup("import", import_id, e))
    }
}

#[derive(Clone)]
pub struct EntityTransitionPersistence {
    store: Arc<dyn MigrationStore>,
}

impl EntityTransitionPersistence {
    pub fn new(store: Arc<dyn MigrationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TransitionPersistence<EntityState> for EntityTransitionPersistence {
    async fn persist_transition(
        &self,
        entity_id: i64,
        allowed_from: &[EntityState],
        to: EntityState,
    ) -> PersistenceResult<bool> {
        self.store
            .compare_and_set_entity_status(entity_id, allowed_from, to)
            .await
            .map_err(|e| PersistenceError::compare_and_set("entity", entity_id, to, e))
    }

    async fn resolve_current_state(&self, entity_id: i64) -> PersistenceResult<Option<EntityState>> {
        self.store
            .find_entity(entity_id)
            .await
            .map(|entity| entity.map(|e| e.status))
            .map_err(|e| PersistenceError::lookup("entity", entity_id, e))
    }
}

#[derive(Clone)]
pub struct TrackerTransitionPersistence {
    store: Arc<dyn MigrationStore>,
}

impl TrackerTransitionPersistence {
    pub fn new(store: Arc<dyn MigrationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TransitionPersistence<TrackerState> for TrackerTransitionPersistence {
    async fn persist_transition(
        &self,
        tracker_id: i64,
        allowed_from: &[TrackerState],
        to: TrackerState,
    ) -> PersistenceResult<bool> {
        self.store
            .compare_and_set_tracker_status(tracker_id, allowed_from, to)
            .await
            .map_err(|e| PersistenceError::compare_and_set("tracker", tracker_id, to, e))
    }

    async fn resolve_current_state(&self, tracker_id: i64) -> PersistenceResult<Option<TrackerState>> {
        self.store
            .find_tracker(tracker_id)
            .await
            .map(|tracker| tracker.map(|t| t.status))
            .map_err(|e| PersistenceError::lookup("tracker", tracker_id, e))
    }
}
