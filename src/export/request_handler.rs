//! Handling of entity-level export requests.
//!
//! When a project entity is promoted the dispatch loop asks the source side
//! to export it. The source answers by scheduling one relation export per
//! exportable relation, each of which goes through the
//! [`RelationExportDispatcher`](super::RelationExportDispatcher).

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::config::ExportConfiguration;
use super::types::{Portable, PortableKind, RelationExportRequest, UserId};
use crate::error::MigrationResult;
use crate::messaging::{EntityExportRequest, JobScheduler};

#[async_trait]
pub trait ExportRequestHandler: Send + Sync {
    async fn handle(&self, request: &EntityExportRequest) -> MigrationResult<()>;
}

/// Fans an entity export request out into relation export jobs.
///
/// The [`Portable`] id on each job is the id of the `bulk_import_entities`
/// row on this side, not the project or group id on the source instance.
/// Exporters that talk to the source look the entity up by that id and use its
/// `source_full_path`.
pub struct RelationFanOutHandler {
    configuration: Arc<dyn ExportConfiguration>,
    scheduler: Arc<dyn JobScheduler>,
    user_id: UserId,
    batched: bool,
}

impl RelationFanOutHandler {
    pub fn new(
        configuration: Arc<dyn ExportConfiguration>,
        scheduler: Arc<dyn JobScheduler>,
        user_id: UserId,
        batched: bool,
    ) -> Self {
        Self {
            configuration,
            scheduler,
            user_id,
            batched,
        }
    }
}

#[async_trait]
impl ExportRequestHandler for RelationFanOutHandler {
    async fn handle(&self, request: &EntityExportRequest) -> MigrationResult<()> {
        let kind = PortableKind::from(request.source_type);
        let portable = Portable {
            id: request.entity_id,
            kind,
        };
        let relations = self.configuration.exportable_relations(kind);

        for relation in &relations {
            self.scheduler
                .enqueue_relation_export(RelationExportRequest::new(
                    self.user_id,
                    portable,
                    relation.clone(),
                    self.batched,
                ))
                .await?;
        }

        info!(
            entity_id = request.entity_id,
            import_id = request.import_id,
            source_full_path = %request.source_full_path,
            relations = relations.len(),
            "Relation exports requested"
        );
        Ok(())
    }
}
