//! Diagnostic records emitted while materializing trackers.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::CatalogEntry;
use crate::constants::{messages, IMPORTER_NAME};
use crate::models::{Entity, SourceType};

/// Structured record for a pipeline skipped by the version gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipNotice {
    pub message: String,
    pub bulk_import_entity_id: i64,
    pub bulk_import_id: i64,
    pub bulk_import_entity_type: SourceType,
    pub source_full_path: String,
    pub importer: String,
    pub pipeline: String,
    pub minimum_source_version: Option<String>,
    pub maximum_source_version: Option<String>,
    pub source_version: Option<String>,
}

impl SkipNotice {
    pub fn new(entity: &Entity, entry: &CatalogEntry, source_version: Option<&str>) -> Self {
        Self {
            message: messages::PIPELINE_SKIPPED.to_string(),
            bulk_import_entity_id: entity.id,
            bulk_import_id: entity.import_id,
            bulk_import_entity_type: entity.source_type,
            source_full_path: entity.source_full_path.clone(),
            importer: IMPORTER_NAME.to_string(),
            pipeline: entry.relation.clone(),
            minimum_source_version: entry.minimum_source_version().map(str::to_string),
            maximum_source_version: entry.maximum_source_version().map(str::to_string),
            source_version: source_version.map(ToString::to_string),
        }
    }
}

pub trait DiagnosticLogger: Send + Sync {
    fn pipeline_skipped(&self, notice: &SkipNotice);
}

/// Writes skip notices as structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnosticLogger;

impl DiagnosticLogger for TracingDiagnosticLogger {
    fn pipeline_skipped(&self, notice: &SkipNotice) {
        info!(
            bulk_import_entity_id = notice.bulk_import_entity_id,
            bulk_import_id = notice.bulk_import_id,
            bulk_import_entity_type = %notice.bulk_import_entity_type,
            source_full_path = %notice.source_full_path,
            importer = %notice.importer,
            pipeline_class = %notice.pipeline,
            minimum_source_version = notice.minimum_source_version.as_deref(),
            maximum_source_version = notice.maximum_source_version.as_deref(),
            source_version = notice.source_version.as_deref(),
            "{}",
            notice.message
        );
    }
}
