//! # Entity Model
//!
//! One group or project migrated under an import. Entities are created
//! externally in `created`; the dispatch loop promotes them and entity workers
//! settle them.
//!
//! ## Database Schema
//!
//! Maps to `bulk_import_entities`:
//! ```sql
//! CREATE TABLE bulk_import_entities (
//!   id BIGSERIAL PRIMARY KEY,
//!   bulk_import_id BIGINT NOT NULL REFERENCES bulk_imports(id) ON DELETE CASCADE,
//!   source_type VARCHAR(32) NOT NULL,
//!   source_full_path TEXT NOT NULL,
//!   status VARCHAR(32) NOT NULL DEFAULT 'created',
//!   created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!   updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state_machine::EntityState;

/// Kind of resource an entity migrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Group,
    Project,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" | "group_entity" => Ok(Self::Group),
            "project" | "project_entity" => Ok(Self::Project),
            _ => Err(format!("Invalid source type: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub import_id: i64,
    pub source_type: SourceType,
    pub source_full_path: String,
    pub status: EntityState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn is_project(&self) -> bool {
        self.source_type == SourceType::Project
    }
}

/// New Entity for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntity {
    pub import_id: i64,
    pub source_type: SourceType,
    pub source_full_path: String,
}

impl NewEntity {
    pub fn group(import_id: i64, source_full_path: impl Into<String>) -> Self {
        Self {
            import_id,
            source_type: SourceType::Group,
            source_full_path: source_full_path.into(),
        }
    }

    pub fn project(import_id: i64, source_full_path: impl Into<String>) -> Self {
        Self {
            import_id,
            source_type: SourceType::Project,
            source_full_path: source_full_path.into(),
        }
    }
}

/// Per-status entity counts for one import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStatusSummary {
    pub created: usize,
    pub started: usize,
    pub finished: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl EntityStatusSummary {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = EntityState>,
    {
        statuses
            .into_iter()
            .fold(Self::default(), |mut summary, status| {
                summary.record(status);
                summary
            })
    }

    pub fn record(&mut self, status: EntityState) {
        self.add(status, 1);
    }

    /// Count `count` entities in `status`
    pub fn add(&mut self, status: EntityState, count: usize) {
        let slot = match status {
            EntityState::Created => &mut self.created,
            EntityState::Started => &mut self.started,
            EntityState::Finished => &mut self.finished,
            EntityState::Failed => &mut self.failed,
            EntityState::Skipped => &mut self.skipped,
        };
        *slot += count;
    }

    pub fn total(&self) -> usize {
        self.created + self.started + self.finished + self.failed + self.skipped
    }

    pub fn non_terminal(&self) -> usize {
        self.created + self.started
    }

    /// True when there is at least one entity and none is still pending
    pub fn all_terminal(&self) -> bool {
        self.total() > 0 && self.non_terminal() == 0
    }
}
