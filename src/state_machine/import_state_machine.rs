use std::sync::Arc;

use tracing::debug;

use super::{
    errors::StateMachineResult,
    events::ImportEvent,
    guards::TransitionGuard,
    persistence::{ImportTransitionPersistence, TransitionPersistence},
    states::ImportState,
};
use crate::store::MigrationStore;

/// Import lifecycle driven by the dispatch loop and the timeout watchdog
#[derive(Clone)]
pub struct ImportStateMachine {
    import_id: i64,
    persistence: ImportTransitionPersistence,
}

impl ImportStateMachine {
    pub fn new(import_id: i64, store: Arc<dyn MigrationStore>) -> Self {
        Self {
            import_id,
            persistence: ImportTransitionPersistence::new(store),
        }
    }

    pub fn import_id(&self) -> i64 {
        self.import_id
    }

    /// Current persisted state; `None` when the import does not exist
    pub async fn current_state(&self) -> StateMachineResult<Option<ImportState>> {
        Ok(self
            .persistence
            .resolve_current_state(self.import_id)
            .await?)
    }

    /// Attempt the transition named by `event`.
    ///
    /// Returns `Ok(false)` when the persisted state is not an allowed
    /// predecessor of the target; the record is left untouched.
    pub async fn transition(&self, event: ImportEvent) -> StateMachineResult<bool> {
        let target = event.target_state();
        let allowed_from = TransitionGuard::import_predecessors(target);

        let applied = self
            .persistence
            .persist_transition(self.import_id, allowed_from, target)
            .await?;

        if applied {
            debug!(
                import_id = self.import_id,
                event = event.event_type(),
                to_state = %target,
                reason = event.error_message(),
                "Import transitioned"
            );
        } else {
            debug!(
                import_id = self.import_id,
                event = event.event_type(),
                to_state = %target,
                "Import transition rejected by predecessor check"
            );
        }

        Ok(applied)
    }

    pub async fn is_terminal(&self) -> StateMachineResult<bool> {
        Ok(self
            .current_state()
            .await?
            .is_some_and(|state| state.is_terminal()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewImport;
    use crate::store::InMemoryMigrationStore;

    #[tokio::test]
    async fn test_import_lifecycle() {
        let store = Arc::new(InMemoryMigrationStore::new());
        let import = store.create_import(NewImport::default()).await.unwrap();
        let machine = ImportStateMachine::new(import.id, store.clone());

        assert!(!machine.transition(ImportEvent::Finish).await.unwrap());
        assert!(machine.transition(ImportEvent::Start).await.unwrap());
        assert!(machine.transition(ImportEvent::Finish).await.unwrap());
        assert!(machine.is_terminal().await.unwrap());

        // Terminal imports ignore later events
        assert!(!machine.transition(ImportEvent::TimeOut).await.unwrap());
        assert_eq!(
            machine.current_state().await.unwrap(),
            Some(ImportState::Finished)
        );
    }

    #[tokio::test]
    async fn test_missing_import_is_not_transitioned() {
        let store = Arc::new(InMemoryMigrationStore::new());
        let machine = ImportStateMachine::new(99, store);

        assert!(!machine.transition(ImportEvent::Start).await.unwrap());
        assert_eq!(machine.current_state().await.unwrap(), None);
    }
}
