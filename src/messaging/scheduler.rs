//! # Job Scheduler
//!
//! The dispatch loop never calls workers directly; it hands [`ScheduledJob`]s
//! to a [`JobScheduler`]. Any scheduling failure is fatal for the current
//! loop pass.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::errors::{MessagingError, MessagingResult};
use super::jobs::{EntityExportRequest, MigrationJob, ScheduledJob};
use crate::export::RelationExportRequest;

#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn schedule(&self, scheduled: ScheduledJob) -> MessagingResult<()>;

    /// Run the dispatch loop for `import_id` after `delay`
    async fn enqueue_import(&self, import_id: i64, delay: Duration) -> MessagingResult<()> {
        self.schedule(ScheduledJob::delayed(
            MigrationJob::ProcessImport { import_id },
            delay,
        ))
        .await
    }

    async fn enqueue_entity(&self, entity_id: i64) -> MessagingResult<()> {
        self.schedule(ScheduledJob::now(MigrationJob::RunEntity { entity_id }))
            .await
    }

    async fn enqueue_export_request(&self, request: EntityExportRequest) -> MessagingResult<()> {
        self.schedule(ScheduledJob::now(MigrationJob::RequestExport(request)))
            .await
    }

    async fn enqueue_relation_export(&self, request: RelationExportRequest) -> MessagingResult<()> {
        self.schedule(ScheduledJob::now(MigrationJob::ExportRelation(request)))
            .await
    }
}

/// Scheduler backed by an unbounded tokio channel drained by the job runner
#[derive(Debug, Clone)]
pub struct ChannelScheduler {
    sender: mpsc::UnboundedSender<ScheduledJob>,
}

impl ChannelScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScheduledJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl JobScheduler for ChannelScheduler {
    async fn schedule(&self, scheduled: ScheduledJob) -> MessagingResult<()> {
        let job_type = scheduled.job.job_type();
        let delay_ms = scheduled.delay.as_millis() as u64;

        self.sender
            .send(scheduled)
            .map_err(|_| MessagingError::ChannelClosed)?;

        debug!(job_type = job_type, delay_ms = delay_ms, "Job scheduled");
        Ok(())
    }
}
