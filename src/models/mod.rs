//! # Data Models
//!
//! Persisted records for imports, entities and pipeline trackers. Each record
//! is mutated only through the status transitions in [`crate::state_machine`].

pub mod entity;
pub mod import;
pub mod tracker;

pub use entity::{Entity, EntityStatusSummary, NewEntity, SourceType};
pub use import::{Import, NewImport};
pub use tracker::{current_stage, NewTracker, Tracker};
