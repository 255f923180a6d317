use std::sync::Arc;

use tracing::debug;

use super::{
    errors::StateMachineResult,
    events::TrackerEvent,
    guards::TransitionGuard,
    persistence::{TrackerTransitionPersistence, TransitionPersistence},
    states::TrackerState,
};
use crate::store::MigrationStore;

/// Tracker lifecycle advanced by the entity worker
#[derive(Clone)]
pub struct TrackerStateMachine {
    tracker_id: i64,
    persistence: TrackerTransitionPersistence,
}

impl TrackerStateMachine {
    pub fn new(tracker_id: i64, store: Arc<dyn MigrationStore>) -> Self {
        Self {
            tracker_id,
            persistence: TrackerTransitionPersistence::new(store),
        }
    }

    pub fn tracker_id(&self) -> i64 {
        self.tracker_id
    }

    pub async fn current_state(&self) -> StateMachineResult<Option<TrackerState>> {
        Ok(self
            .persistence
            .resolve_current_state(self.tracker_id)
            .await?)
    }

    pub async fn transition(&self, event: TrackerEvent) -> StateMachineResult<bool> {
        let target = event.target_state();
        let allowed_from = TransitionGuard::tracker_predecessors(target);

        let applied = self
            .persistence
            .persist_transition(self.tracker_id, allowed_from, target)
            .await?;

        debug!(
            tracker_id = self.tracker_id,
            event = event.event_type(),
            to_state = %target,
            applied = applied,
            reason = event.error_message(),
            "Tracker transition"
        );

        Ok(applied)
    }
}
