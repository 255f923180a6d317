//! # Relation Export Dispatcher
//!
//! Runs the export of one relation of one portable, choosing between the
//! batched and single-shot exporters.
//!
//! ## Mode selection
//!
//! The batched exporter is used only when the request asks for batching, the
//! deployment allows it, and the portable's export configuration marks the
//! relation batchable. Everything else runs single-shot.
//!
//! ## Deduplication
//!
//! Each execution holds an [`ExportLease`] keyed by `(portable, relation)`. A
//! request arriving while another execution holds the lease returns
//! [`ExportOutcome::Deduplicated`] without touching an exporter.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bulk_import_core::export::{
//!     DryRunExporter, ExportLeaseRegistry, ExportMode, Portable, RelationExportDispatcher,
//!     StaticExportConfiguration, UserId,
//! };
//!
//! # tokio_test::block_on(async {
//! let dispatcher = RelationExportDispatcher::new(
//!     Arc::new(StaticExportConfiguration::standard()),
//!     Arc::new(DryRunExporter),
//!     Arc::new(DryRunExporter),
//!     ExportLeaseRegistry::new(Duration::from_secs(3600)),
//! );
//!
//! let issues = dispatcher
//!     .export(UserId(1), Portable::project(42), "issues", true)
//!     .await
//!     .unwrap();
//! assert_eq!(issues.mode(), Some(ExportMode::Batched));
//!
//! let members = dispatcher
//!     .export(UserId(1), Portable::project(42), "members", true)
//!     .await
//!     .unwrap();
//! assert_eq!(members.mode(), Some(ExportMode::Single));
//! # });
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::ExportConfiguration;
use super::lease::{ExportLease, ExportLeaseRegistry};
use super::types::{ExportMode, Portable, RelationExportRequest, UserId};
use crate::logging::log_export_operation;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("Export of {relation} for {portable} failed: {reason}")]
    Failed {
        portable: String,
        relation: String,
        reason: String,
    },

    #[error("Portable not found: {0}")]
    PortableNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),
}

impl ExportError {
    pub fn failed(portable: &Portable, relation: &str, reason: impl Into<String>) -> Self {
        Self::Failed {
            portable: portable.to_string(),
            relation: relation.to_string(),
            reason: reason.into(),
        }
    }
}

/// One export execution as handed to an exporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJob {
    /// Identifies this execution in exporter bookkeeping
    pub job_id: Uuid,
    pub user_id: UserId,
    pub portable: Portable,
    pub relation: String,
    pub mode: ExportMode,
}

/// Serializes one relation of one portable
#[async_trait]
pub trait RelationExporter: Send + Sync {
    async fn export(&self, job: &ExportJob) -> Result<(), ExportError>;
}

/// Exporter that only logs the job; lets the dispatcher binary run end to end
/// without a source instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExporter;

#[async_trait]
impl RelationExporter for DryRunExporter {
    async fn export(&self, job: &ExportJob) -> Result<(), ExportError> {
        info!(
            job_id = %job.job_id,
            portable = %job.portable,
            relation = %job.relation,
            mode = %job.mode,
            "Dry run export executed"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportOutcome {
    Exported { mode: ExportMode, job_id: Uuid },
    /// Another execution for the same portable and relation is running
    Deduplicated,
}

impl ExportOutcome {
    pub fn mode(&self) -> Option<ExportMode> {
        match self {
            Self::Exported { mode, .. } => Some(*mode),
            Self::Deduplicated => None,
        }
    }
}

pub struct RelationExportDispatcher {
    configuration: Arc<dyn ExportConfiguration>,
    single: Arc<dyn RelationExporter>,
    batched: Arc<dyn RelationExporter>,
    leases: ExportLeaseRegistry,
    batched_enabled: bool,
}

impl RelationExportDispatcher {
    pub fn new(
        configuration: Arc<dyn ExportConfiguration>,
        single: Arc<dyn RelationExporter>,
        batched: Arc<dyn RelationExporter>,
        leases: ExportLeaseRegistry,
    ) -> Self {
        Self {
            configuration,
            single,
            batched,
            leases,
            batched_enabled: true,
        }
    }

    /// Deployment-wide switch; when off every export is single-shot
    pub fn with_batched_enabled(mut self, enabled: bool) -> Self {
        self.batched_enabled = enabled;
        self
    }

    pub fn leases(&self) -> &ExportLeaseRegistry {
        &self.leases
    }

    /// Export `relation` of `portable` on behalf of `user_id`
    pub async fn export(
        &self,
        user_id: UserId,
        portable: Portable,
        relation: &str,
        batched: bool,
    ) -> Result<ExportOutcome, ExportError> {
        self.dispatch(&RelationExportRequest::new(
            user_id, portable, relation, batched,
        ))
        .await
    }

    pub async fn dispatch(
        &self,
        request: &RelationExportRequest,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(lease) = self.leases.try_acquire(request.lease_key()) else {
            debug!(
                portable = %request.portable,
                relation = %request.relation,
                "Export already running - skipping duplicate request"
            );
            log_export_operation(
                "export_relation",
                &request.portable.to_string(),
                &request.relation,
                None,
                "deduplicated",
            );
            return Ok(ExportOutcome::Deduplicated);
        };

        let mode = self.select_mode(request);
        let job = ExportJob {
            job_id: Uuid::new_v4(),
            user_id: request.user_id,
            portable: request.portable,
            relation: request.relation.clone(),
            mode,
        };

        let result = self.run(&job, &lease).await;
        drop(lease);

        result.map(|()| ExportOutcome::Exported {
            mode,
            job_id: job.job_id,
        })
    }

    /// Batched iff requested, enabled, and the relation is batchable
    pub fn select_mode(&self, request: &RelationExportRequest) -> ExportMode {
        if self.batched_enabled
            && request.batched
            && self
                .configuration
                .batchable_relation(&request.portable, &request.relation)
        {
            ExportMode::Batched
        } else {
            ExportMode::Single
        }
    }

    async fn run(&self, job: &ExportJob, lease: &ExportLease) -> Result<(), ExportError> {
        let exporter = match job.mode {
            ExportMode::Batched => &self.batched,
            ExportMode::Single => &self.single,
        };

        info!(
            job_id = %job.job_id,
            lease = %lease.key(),
            user_id = %job.user_id,
            mode = %job.mode,
            "Starting relation export"
        );

        match exporter.export(job).await {
            Ok(()) => {
                log_export_operation(
                    "export_relation",
                    &job.portable.to_string(),
                    &job.relation,
                    Some(job.mode.as_str()),
                    "finished",
                );
                Ok(())
            }
            Err(error) => {
                warn!(
                    job_id = %job.job_id,
                    portable = %job.portable,
                    relation = %job.relation,
                    error = %error,
                    "Relation export failed"
                );
                Err(error)
            }
        }
    }
}
