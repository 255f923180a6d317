//! Relation export dispatch: mode selection, deduplication and fan-out.

mod common;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bulk_import_core::export::{
    ExportError, ExportJob, ExportLeaseRegistry, ExportMode, ExportOutcome, ExportRequestHandler,
    Portable, PortableKind, RelationExportDispatcher, RelationExporter, RelationFanOutHandler,
    StaticExportConfiguration, UserId,
};
use bulk_import_core::messaging::{EntityExportRequest, MigrationJob};
use bulk_import_core::models::SourceType;

use common::RecordingScheduler;

/// Exporter that takes a while and remembers every job it ran
#[derive(Default)]
struct SlowExporter {
    delay: Duration,
    runs: AtomicUsize,
    jobs: Mutex<Vec<ExportJob>>,
}

impl SlowExporter {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationExporter for SlowExporter {
    async fn export(&self, job: &ExportJob) -> Result<(), ExportError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.jobs.lock().push(job.clone());
        Ok(())
    }
}

struct BrokenExporter;

#[async_trait]
impl RelationExporter for BrokenExporter {
    async fn export(&self, job: &ExportJob) -> Result<(), ExportError> {
        Err(ExportError::failed(&job.portable, &job.relation, "disk full"))
    }
}

fn configuration() -> Arc<StaticExportConfiguration> {
    Arc::new(
        StaticExportConfiguration::new()
            .with_relations(PortableKind::Project, ["labels", "milestones"])
            .with_batchable(PortableKind::Project, ["issues", "merge_requests"]),
    )
}

struct Fixture {
    single: Arc<SlowExporter>,
    batched: Arc<SlowExporter>,
    dispatcher: Arc<RelationExportDispatcher>,
}

fn fixture(delay: Duration) -> Fixture {
    let single = SlowExporter::new(delay);
    let batched = SlowExporter::new(delay);
    let dispatcher = Arc::new(RelationExportDispatcher::new(
        configuration(),
        single.clone(),
        batched.clone(),
        ExportLeaseRegistry::new(Duration::from_secs(3600)),
    ));
    Fixture {
        single,
        batched,
        dispatcher,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_duplicate_exports_run_once() {
    let fixture = fixture(Duration::from_millis(200));
    let portable = Portable::project(7);

    let first = {
        let dispatcher = fixture.dispatcher.clone();
        tokio::spawn(async move { dispatcher.export(UserId(1), portable, "labels", false).await })
    };
    let second = {
        let dispatcher = fixture.dispatcher.clone();
        tokio::spawn(async move { dispatcher.export(UserId(1), portable, "labels", false).await })
    };

    let mut outcomes = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
    outcomes.sort_by_key(|outcome| matches!(outcome, ExportOutcome::Deduplicated));

    assert!(matches!(
        outcomes[0],
        ExportOutcome::Exported {
            mode: ExportMode::Single,
            ..
        }
    ));
    assert_eq!(outcomes[1], ExportOutcome::Deduplicated);
    assert_eq!(fixture.single.runs(), 1);
    assert_eq!(fixture.batched.runs(), 0);
    assert_eq!(fixture.dispatcher.leases().active_count(), 0);
}

#[tokio::test]
async fn test_lease_is_released_after_each_execution() {
    let fixture = fixture(Duration::ZERO);
    let portable = Portable::project(7);

    for _ in 0..3 {
        let outcome = fixture
            .dispatcher
            .export(UserId(1), portable, "labels", false)
            .await
            .unwrap();
        assert_eq!(outcome.mode(), Some(ExportMode::Single));
    }

    assert_eq!(fixture.single.runs(), 3);
}

#[tokio::test]
async fn test_different_relations_do_not_collide() {
    let fixture = fixture(Duration::from_millis(50));
    let portable = Portable::project(7);

    let (labels, milestones) = tokio::join!(
        fixture.dispatcher.export(UserId(1), portable, "labels", false),
        fixture.dispatcher.export(UserId(1), portable, "milestones", false),
    );

    assert!(labels.unwrap().mode().is_some());
    assert!(milestones.unwrap().mode().is_some());
    assert_eq!(fixture.single.runs(), 2);
}

#[tokio::test]
async fn test_batched_only_for_batchable_relations() {
    let fixture = fixture(Duration::ZERO);
    let portable = Portable::project(9);

    let issues = fixture
        .dispatcher
        .export(UserId(2), portable, "issues", true)
        .await
        .unwrap();
    let labels = fixture
        .dispatcher
        .export(UserId(2), portable, "labels", true)
        .await
        .unwrap();
    let unrequested = fixture
        .dispatcher
        .export(UserId(2), portable, "merge_requests", false)
        .await
        .unwrap();

    assert_eq!(issues.mode(), Some(ExportMode::Batched));
    assert_eq!(labels.mode(), Some(ExportMode::Single));
    assert_eq!(unrequested.mode(), Some(ExportMode::Single));

    let batched_jobs = fixture.batched.jobs.lock().clone();
    assert_eq!(batched_jobs.len(), 1);
    assert_eq!(batched_jobs[0].relation, "issues");
    assert_eq!(batched_jobs[0].user_id, UserId(2));
}

#[tokio::test]
async fn test_disabled_batching_forces_single_exports() {
    let single = SlowExporter::new(Duration::ZERO);
    let batched = SlowExporter::new(Duration::ZERO);
    let dispatcher = RelationExportDispatcher::new(
        configuration(),
        single.clone(),
        batched.clone(),
        ExportLeaseRegistry::new(Duration::from_secs(60)),
    )
    .with_batched_enabled(false);

    let outcome = dispatcher
        .export(UserId(1), Portable::project(3), "issues", true)
        .await
        .unwrap();

    assert_eq!(outcome.mode(), Some(ExportMode::Single));
    assert_eq!(batched.runs(), 0);
    assert_eq!(single.runs(), 1);
}

#[tokio::test]
async fn test_failed_export_releases_the_lease() {
    let dispatcher = RelationExportDispatcher::new(
        configuration(),
        Arc::new(BrokenExporter),
        Arc::new(BrokenExporter),
        ExportLeaseRegistry::new(Duration::from_secs(60)),
    );
    let portable = Portable::project(4);

    let error = dispatcher
        .export(UserId(1), portable, "labels", false)
        .await
        .unwrap_err();

    assert!(matches!(error, ExportError::Failed { .. }));
    assert_eq!(dispatcher.leases().active_count(), 0);
    assert!(dispatcher
        .export(UserId(1), portable, "labels", false)
        .await
        .is_err());
}

#[tokio::test]
async fn test_entity_export_request_fans_out_per_relation() {
    let scheduler = Arc::new(RecordingScheduler::new());
    let handler = RelationFanOutHandler::new(configuration(), scheduler.clone(), UserId(5), true);

    handler
        .handle(&EntityExportRequest {
            entity_id: 12,
            import_id: 3,
            source_type: SourceType::Project,
            source_full_path: "acme/widgets".to_string(),
        })
        .await
        .unwrap();

    let mut relations: Vec<String> = scheduler
        .jobs()
        .into_iter()
        .map(|scheduled| match scheduled.job {
            MigrationJob::ExportRelation(request) => {
                assert_eq!(request.portable, Portable::project(12));
                assert_eq!(request.user_id, UserId(5));
                assert!(request.batched);
                request.relation
            }
            other => panic!("unexpected job: {other:?}"),
        })
        .collect();
    relations.sort();

    assert_eq!(
        relations,
        vec!["issues", "labels", "merge_requests", "milestones"]
    );
}
