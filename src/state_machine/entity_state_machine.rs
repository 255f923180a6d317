use std::sync::Arc;

use tracing::debug;

use super::{
    errors::StateMachineResult,
    events::EntityEvent,
    guards::TransitionGuard,
    persistence::{EntityTransitionPersistence, TransitionPersistence},
    states::{EntityState, TrackerState},
};
use crate::store::MigrationStore;

/// Entity lifecycle. Promotion to `started` normally happens through
/// [`MigrationStore::promote_entity`]; this machine settles the entity once
/// its trackers are done.
#[derive(Clone)]
pub struct EntityStateMachine {
    entity_id: i64,
    persistence: EntityTransitionPersistence,
}

impl EntityStateMachine {
    pub fn new(entity_id: i64, store: Arc<dyn MigrationStore>) -> Self {
        Self {
            entity_id,
            persistence: EntityTransitionPersistence::new(store),
        }
    }

    pub fn entity_id(&self) -> i64 {
        self.entity_id
    }

    pub async fn current_state(&self) -> StateMachineResult<Option<EntityState>> {
        Ok(self
            .persistence
            .resolve_current_state(self.entity_id)
            .await?)
    }

    pub async fn transition(&self, event: EntityEvent) -> StateMachineResult<bool> {
        let target = event.target_state();
        let allowed_from = TransitionGuard::entity_predecessors(target);

        let applied = self
            .persistence
            .persist_transition(self.entity_id, allowed_from, target)
            .await?;

        debug!(
            entity_id = self.entity_id,
            event = event.event_type(),
            to_state = %target,
            applied = applied,
            reason = event.error_message(),
            "Entity transition"
        );

        Ok(applied)
    }
}

/// Terminal entity status implied by its trackers.
///
/// `None` while any tracker is still pending. Once all are terminal the entity
/// fails if any tracker failed and finishes otherwise.
pub fn completion_state(trackers: &[TrackerState]) -> Option<EntityState> {
    if trackers.iter().any(|state| !state.is_terminal()) {
        return None;
    }

    if trackers.iter().any(TrackerState::is_error) {
        Some(EntityState::Failed)
    } else {
        Some(EntityState::Finished)
    }
}
