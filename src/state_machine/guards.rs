//! # Transition Guards
//!
//! Allowed-predecessor tables for every status field. A persisted transition
//! only applies when the record's current status is listed as a predecessor of
//! the target; anything else is a stale or out-of-order update and is rejected.
//!
//! These tables are what make concurrent entity workers and dispatch loops
//! safe against the same import without a global lock.

use super::states::{EntityState, ImportState, TrackerState};

/// Static predecessor tables for import, entity and tracker statuses
pub struct TransitionGuard;

impl TransitionGuard {
    pub fn import_predecessors(target: ImportState) -> &'static [ImportState] {
        use ImportState::*;
        match target {
            Created => &[],
            Started => &[Created],
            Finished => &[Started],
            Failed => &[Created, Started],
            Timeout => &[Created, Started],
        }
    }

    pub fn entity_predecessors(target: EntityState) -> &'static [EntityState] {
        use EntityState::*;
        match target {
            Created => &[],
            Started => &[Created],
            Finished => &[Started],
            Failed => &[Created, Started],
            Skipped => &[Created],
        }
    }

    pub fn tracker_predecessors(target: TrackerState) -> &'static [TrackerState] {
        use TrackerState::*;
        match target {
            Created => &[],
            Started => &[Created],
            Finished => &[Started],
            Failed => &[Created, Started],
            Skipped => &[Created, Started],
        }
    }
}
