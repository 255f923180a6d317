//! # In-Memory Migration Store
//!
//! Thread-safe [`MigrationStore`] backed by ordered maps behind one
//! `parking_lot::RwLock`. Holding a single lock for each call gives the same
//! atomicity the PostgreSQL store gets from transactions, so the promotion
//! ceiling and predecessor checks behave identically.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{MigrationStore, PromotionOutcome};
use crate::error::MigrationResult;
use crate::models::{
    Entity, EntityStatusSummary, Import, NewEntity, NewImport, NewTracker, Tracker,
};
use crate::state_machine::{EntityState, ImportState, TrackerState};

#[derive(Debug, Default)]
struct StoreState {
    imports: BTreeMap<i64, Import>,
    entities: BTreeMap<i64, Entity>,
    trackers: BTreeMap<i64, Tracker>,
    next_import_id: i64,
    next_entity_id: i64,
    next_tracker_id: i64,
}

impl StoreState {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn started_count(&self, import_id: i64) -> usize {
        self.entities
            .values()
            .filter(|e| e.import_id == import_id && e.status == EntityState::Started)
            .count()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMigrationStore {
    state: RwLock<StoreState>,
}

impl InMemoryMigrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity directly in `status`, bypassing the transition table.
    ///
    /// Used to seed fixtures that model entities advanced by other workers.
    pub fn seed_entity(&self, new_entity: NewEntity, status: EntityState) -> Entity {
        let mut state = self.state.write();
        let now = Utc::now();
        let entity = Entity {
            id: StoreState::next_id(&mut state.next_entity_id),
            import_id: new_entity.import_id,
            source_type: new_entity.source_type,
            source_full_path: new_entity.source_full_path,
            status,
            created_at: now,
            updated_at: now,
        };
        state.entities.insert(entity.id, entity.clone());
        entity
    }

    /// Insert an import directly in `status` with an explicit creation time
    pub fn seed_import(
        &self,
        new_import: NewImport,
        status: ImportState,
        created_at: chrono::DateTime<Utc>,
    ) -> Import {
        let mut state = self.state.write();
        let import = Import {
            id: StoreState::next_id(&mut state.next_import_id),
            status,
            source_version: new_import.source_version,
            created_at,
            updated_at: created_at,
        };
        state.imports.insert(import.id, import.clone());
        import
    }

    /// Overwrite a tracker's last status change time; `false` if it does not exist
    pub fn backdate_tracker(&self, tracker_id: i64, updated_at: chrono::DateTime<Utc>) -> bool {
        match self.state.write().trackers.get_mut(&tracker_id) {
            Some(tracker) => {
                tracker.updated_at = updated_at;
                true
            }
            None => false,
        }
    }

    pub fn tracker_count(&self) -> usize {
        self.state.read().trackers.len()
    }

    pub fn entities_for_import(&self, import_id: i64) -> Vec<Entity> {
        self.state
            .read()
            .entities
            .values()
            .filter(|e| e.import_id == import_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MigrationStore for InMemoryMigrationStore {
    async fn create_import(&self, new_import: NewImport) -> MigrationResult<Import> {
        Ok(self.seed_import(new_import, ImportState::Created, Utc::now()))
    }

    async fn find_import(&self, import_id: i64) -> MigrationResult<Option<Import>> {
        Ok(self.state.read().imports.get(&import_id).cloned())
    }

    async fn imports_with_status(&self, statuses: &[ImportState]) -> MigrationResult<Vec<Import>> {
        let state = self.state.read();
        let mut imports: Vec<Import> = state
            .imports
            .values()
            .filter(|import| statuses.contains(&import.status))
            .cloned()
            .collect();
        imports.sort_by_key(|import| (import.created_at, import.id));
        Ok(imports)
    }

    async fn compare_and_set_import_status(
        &self,
        import_id: i64,
        allowed_from: &[ImportState],
        to: ImportState,
    ) -> MigrationResult<bool> {
        let mut state = self.state.write();
        match state.imports.get_mut(&import_id) {
            Some(import) if allowed_from.contains(&import.status) => {
                import.status = to;
                import.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_entity(&self, new_entity: NewEntity) -> MigrationResult<Entity> {
        Ok(self.seed_entity(new_entity, EntityState::Created))
    }

    async fn find_entity(&self, entity_id: i64) -> MigrationResult<Option<Entity>> {
        Ok(self.state.read().entities.get(&entity_id).cloned())
    }

    async fn entity_status_summary(&self, import_id: i64) -> MigrationResult<EntityStatusSummary> {
        let state = self.state.read();
        Ok(EntityStatusSummary::from_statuses(
            state
                .entities
                .values()
                .filter(|e| e.import_id == import_id)
                .map(|e| e.status),
        ))
    }

    async fn created_entities(&self, import_id: i64, limit: usize) -> MigrationResult<Vec<Entity>> {
        let state = self.state.read();
        Ok(state
            .entities
            .values()
            .filter(|e| e.import_id == import_id && e.status == EntityState::Created)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn started_entities(&self, import_id: i64) -> MigrationResult<Vec<Entity>> {
        let state = self.state.read();
        Ok(state
            .entities
            .values()
            .filter(|e| e.import_id == import_id && e.status == EntityState::Started)
            .cloned()
            .collect())
    }

    async fn compare_and_set_entity_status(
        &self,
        entity_id: i64,
        allowed_from: &[EntityState],
        to: EntityState,
    ) -> MigrationResult<bool> {
        let mut state = self.state.write();
        match state.entities.get_mut(&entity_id) {
            Some(entity) if allowed_from.contains(&entity.status) => {
                entity.status = to;
                entity.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn promote_entity(
        &self,
        entity_id: i64,
        ceiling: usize,
        trackers: Vec<NewTracker>,
    ) -> MigrationResult<PromotionOutcome> {
        let mut state = self.state.write();

        let (import_id, status) = match state.entities.get(&entity_id) {
            Some(entity) => (entity.import_id, entity.status),
            None => return Ok(PromotionOutcome::NotClaimable(None)),
        };

        if status != EntityState::Created {
            return Ok(PromotionOutcome::NotClaimable(Some(status)));
        }

        if state.started_count(import_id) >= ceiling {
            return Ok(PromotionOutcome::AtCapacity);
        }

        let now = Utc::now();
        if let Some(entity) = state.entities.get_mut(&entity_id) {
            entity.status = EntityState::Started;
            entity.updated_at = now;
        }

        let mut created = Vec::with_capacity(trackers.len());
        for new_tracker in trackers {
            let duplicate = state
                .trackers
                .values()
                .any(|t| t.entity_id == entity_id && t.relation == new_tracker.relation);
            if duplicate {
                continue;
            }

            let tracker = Tracker {
                id: StoreState::next_id(&mut state.next_tracker_id),
                entity_id,
                stage: new_tracker.stage,
                relation: new_tracker.relation,
                status: new_tracker.status,
                created_at: now,
                updated_at: now,
            };
            state.trackers.insert(tracker.id, tracker.clone());
            created.push(tracker);
        }
        created.sort_by_key(|t| (t.stage, t.id));

        Ok(PromotionOutcome::Promoted(created))
    }

    async fn trackers_for_entity(&self, entity_id: i64) -> MigrationResult<Vec<Tracker>> {
        let state = self.state.read();
        let mut trackers: Vec<Tracker> = state
            .trackers
            .values()
            .filter(|t| t.entity_id == entity_id)
            .cloned()
            .collect();
        trackers.sort_by_key(|t| (t.stage, t.id));
        Ok(trackers)
    }

    async fn find_tracker(&self, tracker_id: i64) -> MigrationResult<Option<Tracker>> {
        Ok(self.state.read().trackers.get(&tracker_id).cloned())
    }

    async fn compare_and_set_tracker_status(
        &self,
        tracker_id: i64,
        allowed_from: &[TrackerState],
        to: TrackerState,
    ) -> MigrationResult<bool> {
        let mut state = self.state.write();
        match state.trackers.get_mut(&tracker_id) {
            Some(tracker) if allowed_from.contains(&tracker.status) => {
                tracker.status = to;
                tracker.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
