//! # Migration System Bootstrap
//!
//! Wires a store, the stage catalog and the external collaborators into a
//! running set of services that share one [`ChannelScheduler`].
//!
//! Scheduled jobs live only in the channel, so a fresh process calls
//! [`MigrationSystem::resume`] to rebuild them from persisted state.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bulk_import_core::config::MigrationConfig;
//! use bulk_import_core::orchestration::{MigrationSystem, SystemComponents};
//! use bulk_import_core::store::InMemoryMigrationStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryMigrationStore::new());
//! let (system, receiver) =
//!     MigrationSystem::build(&MigrationConfig::default(), store, SystemComponents::dry_run())?;
//! system.resume().await?;
//! let handle = system.runner.clone().spawn(receiver);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::diagnostics::{DiagnosticLogger, TracingDiagnosticLogger};
use super::entity_worker::EntityWorker;
use super::error_reporting::{ErrorReporter, TracingErrorReporter};
use super::import_watchdog::ImportWatchdog;
use super::job_runner::JobRunner;
use super::process_service::ProcessService;
use super::tracker_materializer::TrackerMaterializer;
use crate::catalog::{standard, PipelineRegistry, StageCatalog};
use crate::config::MigrationConfig;
use crate::error::MigrationResult;
use crate::export::{
    DryRunExporter, ExportConfiguration, ExportLeaseRegistry, RelationExportDispatcher,
    RelationExporter, RelationFanOutHandler, StaticExportConfiguration, UserId,
};
use crate::constants::status_groups::IMPORT_ACTIVE;
use crate::messaging::{ChannelScheduler, EntityExportRequest, JobScheduler, ScheduledJob};
use crate::store::MigrationStore;

/// External collaborators plugged into the core
pub struct SystemComponents {
    pub registry: PipelineRegistry,
    pub catalog: Option<StageCatalog>,
    pub single_exporter: Arc<dyn RelationExporter>,
    pub batched_exporter: Arc<dyn RelationExporter>,
    pub export_configuration: Arc<dyn ExportConfiguration>,
    pub diagnostics: Arc<dyn DiagnosticLogger>,
    pub reporter: Arc<dyn ErrorReporter>,
    /// User on whose behalf relation exports are requested
    pub export_user: UserId,
}

impl SystemComponents {
    /// Standard catalog over dry-run pipelines and exporters
    pub fn dry_run() -> Self {
        Self {
            registry: PipelineRegistry::dry_run(standard::relations()),
            catalog: None,
            single_exporter: Arc::new(DryRunExporter),
            batched_exporter: Arc::new(DryRunExporter),
            export_configuration: Arc::new(StaticExportConfiguration::standard()),
            diagnostics: Arc::new(TracingDiagnosticLogger),
            reporter: Arc::new(TracingErrorReporter),
            export_user: UserId(1),
        }
    }
}

/// Jobs re-created by [`MigrationSystem::resume`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSummary {
    pub imports: usize,
    pub entities: usize,
    pub export_requests: usize,
}

pub struct MigrationSystem {
    pub store: Arc<dyn MigrationStore>,
    pub scheduler: Arc<ChannelScheduler>,
    pub catalog: Arc<StageCatalog>,
    pub process: Arc<ProcessService>,
    pub entity_worker: Arc<EntityWorker>,
    pub exports: Arc<RelationExportDispatcher>,
    pub watchdog: Arc<ImportWatchdog>,
    pub runner: Arc<JobRunner>,
}

impl MigrationSystem {
    /// Build every service; the receiver must be handed to [`JobRunner::run`]
    pub fn build(
        config: &MigrationConfig,
        store: Arc<dyn MigrationStore>,
        components: SystemComponents,
    ) -> MigrationResult<(Self, mpsc::UnboundedReceiver<ScheduledJob>)> {
        config.validate()?;

        let catalog = match components.catalog {
            Some(catalog) => catalog,
            None => StageCatalog::standard(&components.registry)?,
        };
        let catalog = Arc::new(catalog);

        let (scheduler, receiver) = ChannelScheduler::new();
        let scheduler = Arc::new(scheduler);
        let job_scheduler: Arc<dyn JobScheduler> = scheduler.clone();

        let process = Arc::new(ProcessService::new(
            store.clone(),
            job_scheduler.clone(),
            TrackerMaterializer::new(catalog.clone(), components.diagnostics),
            components.reporter,
            &config.dispatch,
        ));

        let entity_worker = Arc::new(
            EntityWorker::new(
                store.clone(),
                job_scheduler.clone(),
                catalog.clone(),
                config.dispatch.perform_delay(),
            )
            .with_stale_tracker_after(config.dispatch.stale_tracker_after()),
        );

        let exports = Arc::new(
            RelationExportDispatcher::new(
                components.export_configuration.clone(),
                components.single_exporter,
                components.batched_exporter,
                ExportLeaseRegistry::new(config.export.lease_ttl()),
            )
            .with_batched_enabled(config.export.batched_enabled),
        );

        let export_requests = Arc::new(RelationFanOutHandler::new(
            components.export_configuration,
            job_scheduler,
            components.export_user,
            config.export.batched_enabled,
        ));

        let watchdog = Arc::new(ImportWatchdog::new(
            store.clone(),
            config.watchdog.import_timeout(),
        )?);

        let runner = Arc::new(JobRunner::new(
            process.clone(),
            entity_worker.clone(),
            exports.clone(),
            export_requests,
        ));

        info!(
            batch_size = config.dispatch.batch_size,
            perform_delay_ms = config.dispatch.perform_delay_ms,
            batched_exports = config.export.batched_enabled,
            "Migration system built"
        );

        Ok((
            Self {
                store,
                scheduler,
                catalog,
                process,
                entity_worker,
                exports,
                watchdog,
                runner,
            },
            receiver,
        ))
    }

    /// Re-enqueue the work of every active import.
    ///
    /// Each import gets an immediate dispatch pass and each of its `started`
    /// entities gets an entity pass, plus an export request for projects.
    /// Duplicate entity passes are harmless: trackers are claimed by
    /// compare-and-set and exports are deduplicated by lease.
    pub async fn resume(&self) -> MigrationResult<ResumeSummary> {
        let mut summary = ResumeSummary::default();

        for import in self.store.imports_with_status(&IMPORT_ACTIVE).await? {
            for entity in self.store.started_entities(import.id).await? {
                self.scheduler.enqueue_entity(entity.id).await?;
                summary.entities += 1;

                if entity.is_project() {
                    self.scheduler
                        .enqueue_export_request(EntityExportRequest::from(&entity))
                        .await?;
                    summary.export_requests += 1;
                }
            }

            self.scheduler
                .enqueue_import(import.id, Duration::ZERO)
                .await?;
            summary.imports += 1;
        }

        info!(
            imports = summary.imports,
            entities = summary.entities,
            export_requests = summary.export_requests,
            "Resumed active imports"
        );

        Ok(summary)
    }
}
