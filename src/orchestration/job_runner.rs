//! # Job Runner
//!
//! Consumes [`ScheduledJob`]s from the scheduler channel and routes them to
//! the dispatch loop, entity workers and export components. Every job runs on
//! its own task; delayed jobs sleep on that task first, so a long delay never
//! blocks the channel.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::entity_worker::EntityWorker;
use super::process_service::ProcessService;
use crate::error::MigrationResult;
use crate::export::{ExportRequestHandler, RelationExportDispatcher};
use crate::messaging::{MigrationJob, ScheduledJob};

pub struct JobRunner {
    process: Arc<ProcessService>,
    entity_worker: Arc<EntityWorker>,
    exports: Arc<RelationExportDispatcher>,
    export_requests: Arc<dyn ExportRequestHandler>,
}

impl JobRunner {
    pub fn new(
        process: Arc<ProcessService>,
        entity_worker: Arc<EntityWorker>,
        exports: Arc<RelationExportDispatcher>,
        export_requests: Arc<dyn ExportRequestHandler>,
    ) -> Self {
        Self {
            process,
            entity_worker,
            exports,
            export_requests,
        }
    }

    /// Route one job to its handler
    pub async fn execute(&self, job: MigrationJob) -> MigrationResult<()> {
        let job_type = job.job_type();

        match job {
            MigrationJob::ProcessImport { import_id } => {
                let outcome = self.process.process(import_id).await;
                debug!(import_id = import_id, outcome = ?outcome, "Process job done");
            }
            MigrationJob::RunEntity { entity_id } => {
                let outcome = self.entity_worker.perform(entity_id).await?;
                debug!(entity_id = entity_id, outcome = ?outcome, "Entity job done");
            }
            MigrationJob::RequestExport(request) => {
                self.export_requests.handle(&request).await?;
            }
            MigrationJob::ExportRelation(request) => {
                let outcome = self.exports.dispatch(&request).await?;
                debug!(
                    portable = %request.portable,
                    relation = %request.relation,
                    outcome = ?outcome,
                    "Export job done"
                );
            }
        }

        debug!(job_type = job_type, "Job executed");
        Ok(())
    }

    /// Drain `receiver` until every sender is gone
    pub async fn run(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<ScheduledJob>) {
        info!("Job runner started");

        while let Some(scheduled) = receiver.recv().await {
            let runner = Arc::clone(&self);
            tokio::spawn(async move {
                if !scheduled.is_immediate() {
                    tokio::time::sleep(scheduled.delay).await;
                }

                let job_type = scheduled.job.job_type();
                if let Err(e) = runner.execute(scheduled.job).await {
                    error!(job_type = job_type, error = %e, "Job failed");
                }
            });
        }

        info!("Job channel closed - job runner stopping");
    }

    pub fn spawn(self: Arc<Self>, receiver: mpsc::UnboundedReceiver<ScheduledJob>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }
}
