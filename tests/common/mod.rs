#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bulk_import_core::catalog::{
    standard, DryRunPipeline, Pipeline, PipelineContext, PipelineError, PipelineRegistry,
    StageCatalog,
};
use bulk_import_core::config::DispatchSettings;
use bulk_import_core::error::MigrationError;
use bulk_import_core::messaging::{
    JobScheduler, MessagingError, MessagingResult, MigrationJob, ScheduledJob,
};
use bulk_import_core::models::{Import, NewImport};
use bulk_import_core::orchestration::{
    DiagnosticLogger, EntityWorker, ErrorReporter, ProcessService, SkipNotice, TrackerMaterializer,
};
use bulk_import_core::state_machine::ImportState;
use bulk_import_core::store::{InMemoryMigrationStore, MigrationStore};

/// Scheduler that records jobs instead of delivering them
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    jobs: Mutex<Vec<ScheduledJob>>,
    rejecting: AtomicBool,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every further `schedule` call fail
    pub fn reject_all(&self) {
        self.rejecting.store(true, Ordering::SeqCst);
    }

    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.lock().clone()
    }

    pub fn take(&self) -> Vec<ScheduledJob> {
        std::mem::take(&mut *self.jobs.lock())
    }

    pub fn import_passes(&self, import_id: i64) -> Vec<ScheduledJob> {
        self.jobs()
            .into_iter()
            .filter(|s| matches!(s.job, MigrationJob::ProcessImport { import_id: id } if id == import_id))
            .collect()
    }

    pub fn entity_runs(&self) -> Vec<i64> {
        self.jobs()
            .into_iter()
            .filter_map(|s| match s.job {
                MigrationJob::RunEntity { entity_id } => Some(entity_id),
                _ => None,
            })
            .collect()
    }

    pub fn export_requests(&self) -> Vec<i64> {
        self.jobs()
            .into_iter()
            .filter_map(|s| match s.job {
                MigrationJob::RequestExport(request) => Some(request.entity_id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl JobScheduler for RecordingScheduler {
    async fn schedule(&self, scheduled: ScheduledJob) -> MessagingResult<()> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(MessagingError::ChannelClosed);
        }
        self.jobs.lock().push(scheduled);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, i64)>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(String, i64)> {
        self.reports.lock().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn track_exception(&self, error: &MigrationError, import_id: i64) {
        self.reports.lock().push((error.to_string(), import_id));
    }
}

#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    notices: Mutex<Vec<SkipNotice>>,
}

impl RecordingDiagnostics {
    pub fn notices(&self) -> Vec<SkipNotice> {
        self.notices.lock().clone()
    }
}

impl DiagnosticLogger for RecordingDiagnostics {
    fn pipeline_skipped(&self, notice: &SkipNotice) {
        self.notices.lock().push(notice.clone());
    }
}

/// Pipeline that always fails
pub struct FailingPipeline {
    relation: String,
}

impl FailingPipeline {
    pub fn new(relation: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            relation: relation.into(),
        })
    }
}

#[async_trait]
impl Pipeline for FailingPipeline {
    fn relation(&self) -> &str {
        &self.relation
    }

    async fn run(&self, _context: &PipelineContext) -> Result<(), PipelineError> {
        Err(PipelineError::failed(&self.relation, "source returned 500"))
    }
}

/// Pipeline that counts its runs
pub struct CountingPipeline {
    relation: String,
    runs: AtomicUsize,
}

impl CountingPipeline {
    pub fn new(relation: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            relation: relation.into(),
            runs: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pipeline for CountingPipeline {
    fn relation(&self) -> &str {
        &self.relation
    }

    async fn run(&self, _context: &PipelineContext) -> Result<(), PipelineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn dry_run_registry() -> PipelineRegistry {
    PipelineRegistry::dry_run(standard::relations())
}

pub fn standard_catalog() -> StageCatalog {
    StageCatalog::standard(&dry_run_registry()).expect("standard catalog builds")
}

pub fn dispatch_settings(batch_size: usize) -> DispatchSettings {
    DispatchSettings {
        batch_size,
        perform_delay_ms: 5_000,
        ..DispatchSettings::default()
    }
}

/// Dispatch loop and entity worker over an in-memory store and a recording scheduler
pub struct Harness {
    pub store: Arc<InMemoryMigrationStore>,
    pub scheduler: Arc<RecordingScheduler>,
    pub reporter: Arc<RecordingReporter>,
    pub diagnostics: Arc<RecordingDiagnostics>,
    pub catalog: Arc<StageCatalog>,
    pub process: ProcessService,
    pub entity_worker: EntityWorker,
}

impl Harness {
    pub fn new(batch_size: usize) -> Self {
        Self::with_catalog(standard_catalog(), batch_size)
    }

    pub fn with_catalog(catalog: StageCatalog, batch_size: usize) -> Self {
        let store = Arc::new(InMemoryMigrationStore::new());
        let scheduler = Arc::new(RecordingScheduler::new());
        let reporter = Arc::new(RecordingReporter::default());
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let catalog = Arc::new(catalog);

        let process = ProcessService::new(
            store.clone(),
            scheduler.clone(),
            TrackerMaterializer::new(catalog.clone(), diagnostics.clone()),
            reporter.clone(),
            &dispatch_settings(batch_size),
        );
        let entity_worker = EntityWorker::new(
            store.clone(),
            scheduler.clone(),
            catalog.clone(),
            Duration::from_millis(10),
        );

        Self {
            store,
            scheduler,
            reporter,
            diagnostics,
            catalog,
            process,
            entity_worker,
        }
    }

    pub async fn create_import(&self, source_version: Option<&str>) -> Import {
        let new_import = NewImport {
            source_version: source_version.map(ToString::to_string),
        };
        self.store
            .create_import(new_import)
            .await
            .expect("import created")
    }

    pub async fn import_status(&self, import_id: i64) -> ImportState {
        self.store
            .find_import(import_id)
            .await
            .expect("store read")
            .expect("import exists")
            .status
    }

    /// Execute recorded jobs, ignoring delays and export traffic, until the
    /// queue is empty or `max_jobs` have run
    pub async fn drain(&self, max_jobs: usize) -> usize {
        let mut executed = 0;
        while executed < max_jobs {
            let pending = self.scheduler.take();
            if pending.is_empty() {
                break;
            }
            for scheduled in pending {
                match scheduled.job {
                    MigrationJob::ProcessImport { import_id } => {
                        self.process.process(import_id).await;
                    }
                    MigrationJob::RunEntity { entity_id } => {
                        self.entity_worker
                            .perform(entity_id)
                            .await
                            .expect("entity pass");
                    }
                    MigrationJob::RequestExport(_) | MigrationJob::ExportRelation(_) => {}
                }
                executed += 1;
            }
        }
        executed
    }
}

/// Registry where every standard relation is a dry run except `overrides`
pub fn registry_with(overrides: Vec<Arc<dyn Pipeline>>) -> PipelineRegistry {
    let mut registry = PipelineRegistry::new();
    for relation in standard::relations() {
        if overrides.iter().any(|p| p.relation() == relation) {
            continue;
        }
        registry.register(Arc::new(DryRunPipeline::new(relation)));
    }
    for pipeline in overrides {
        registry.register(pipeline);
    }
    registry
}
