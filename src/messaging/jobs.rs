//! Job messages exchanged between the dispatch loop and its workers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::export::RelationExportRequest;
use crate::models::{Entity, SourceType};

/// Request to start exporting a project entity on the source side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityExportRequest {
    pub entity_id: i64,
    pub import_id: i64,
    pub source_type: SourceType,
    pub source_full_path: String,
}

impl From<&Entity> for EntityExportRequest {
    fn from(entity: &Entity) -> Self {
        Self {
            entity_id: entity.id,
            import_id: entity.import_id,
            source_type: entity.source_type,
            source_full_path: entity.source_full_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum MigrationJob {
    /// One pass of the dispatch loop for an import
    ProcessImport { import_id: i64 },
    /// Advance the trackers of a started entity
    RunEntity { entity_id: i64 },
    RequestExport(EntityExportRequest),
    ExportRelation(RelationExportRequest),
}

impl MigrationJob {
    pub fn job_type(&self) -> &'static str {
        match self {
            Self::ProcessImport { .. } => "process_import",
            Self::RunEntity { .. } => "run_entity",
            Self::RequestExport(_) => "request_export",
            Self::ExportRelation(_) => "export_relation",
        }
    }
}

/// A job and how long to wait before running it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job: MigrationJob,
    pub delay: Duration,
}

impl ScheduledJob {
    pub fn now(job: MigrationJob) -> Self {
        Self {
            job,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(job: MigrationJob, delay: Duration) -> Self {
        Self { job, delay }
    }

    pub fn is_immediate(&self) -> bool {
        self.delay.is_zero()
    }
}
