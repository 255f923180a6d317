//! # Tracker Model
//!
//! One `(entity, pipeline)` execution record. Trackers are written once per
//! entity when it is promoted and advanced by the entity worker.
//!
//! ## Database Schema
//!
//! Maps to `bulk_import_trackers`:
//! ```sql
//! CREATE TABLE bulk_import_trackers (
//!   id BIGSERIAL PRIMARY KEY,
//!   bulk_import_entity_id BIGINT NOT NULL REFERENCES bulk_import_entities(id) ON DELETE CASCADE,
//!   stage INTEGER NOT NULL,
//!   relation TEXT NOT NULL,
//!   status VARCHAR(32) NOT NULL DEFAULT 'created',
//!   created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!   updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!   UNIQUE (bulk_import_entity_id, relation)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::TrackerState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: i64,
    pub entity_id: i64,
    pub stage: u32,
    /// Pipeline identifier
    pub relation: String,
    pub status: TrackerState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New Tracker for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTracker {
    pub stage: u32,
    pub relation: String,
    /// Either `created` or `skipped` at materialization time
    pub status: TrackerState,
}

/// Lowest stage that still has non-terminal trackers, if any
pub fn current_stage(trackers: &[Tracker]) -> Option<u32> {
    trackers
        .iter()
        .filter(|tracker| !tracker.status.is_terminal())
        .map(|tracker| tracker.stage)
        .min()
}
