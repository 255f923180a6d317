// State machine module for migration orchestration
//
// Imports, entities and trackers each carry one status field. Every change is
// checked against an allowed-predecessor table and applied as a
// compare-and-set, so stale writers lose instead of overwriting.

pub mod entity_state_machine;
pub mod errors;
pub mod events;
pub mod guards;
pub mod import_state_machine;
pub mod persistence;
pub mod states;
pub mod tracker_state_machine;

// Re-export main types for convenient access
pub use entity_state_machine::{completion_state, EntityStateMachine};
pub use errors::{PersistenceError, StateMachineError};
pub use events::{EntityEvent, ImportEvent, TrackerEvent};
pub use import_state_machine::ImportStateMachine;
pub use states::{EntityState, ImportState, TrackerState};
pub use tracker_state_machine::TrackerStateMachine;

pub use guards::TransitionGuard;
pub use persistence::TransitionPersistence;
