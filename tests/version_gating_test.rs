//! Tracker materialization against source instance versions.

mod common;

use bulk_import_core::catalog::{StageCatalog, StagedPipeline};
use bulk_import_core::constants::{messages, IMPORTER_NAME};
use bulk_import_core::models::{NewEntity, SourceType};
use bulk_import_core::state_machine::TrackerState;
use bulk_import_core::store::MigrationStore;

use common::{dry_run_registry, Harness};

/// Catalog with one always-on project pipeline and one bounded `labels` pipeline
fn bounded_catalog(minimum: Option<&str>, maximum: Option<&str>) -> StageCatalog {
    let mut labels = StagedPipeline::new("labels", 1);
    if let Some(minimum) = minimum {
        labels = labels.minimum(minimum);
    }
    if let Some(maximum) = maximum {
        labels = labels.maximum(maximum);
    }

    StageCatalog::builder()
        .project([StagedPipeline::new("project", 0), labels])
        .build(&dry_run_registry())
        .expect("catalog builds")
}

async fn labels_status(
    source_version: Option<&str>,
    minimum: Option<&str>,
    maximum: Option<&str>,
) -> (TrackerState, Harness) {
    let harness = Harness::with_catalog(bounded_catalog(minimum, maximum), 3);
    let import = harness.create_import(source_version).await;
    let entity = harness
        .store
        .create_entity(NewEntity::project(import.id, "acme/widgets"))
        .await
        .unwrap();

    harness.process.process(import.id).await;

    let trackers = harness.store.trackers_for_entity(entity.id).await.unwrap();
    assert_eq!(trackers.len(), 2);
    assert_eq!(trackers[0].relation, "project");
    assert_eq!(trackers[0].status, TrackerState::Created);

    let labels = trackers
        .iter()
        .find(|t| t.relation == "labels")
        .expect("labels tracker");
    (labels.status, harness)
}

#[tokio::test]
async fn test_minimum_bound_gates_pipelines() {
    let cases = [
        ("14.10", TrackerState::Created),
        ("15.0", TrackerState::Created),
        ("15.1", TrackerState::Skipped),
        ("16.0", TrackerState::Skipped),
    ];

    for (minimum, expected) in cases {
        let (status, _) = labels_status(Some("15.0.0"), Some(minimum), None).await;
        assert_eq!(status, expected, "minimum {minimum}");
    }
}

#[tokio::test]
async fn test_maximum_bound_gates_pipelines() {
    let cases = [
        ("14.10", TrackerState::Skipped),
        ("15.0", TrackerState::Created),
        ("15.1", TrackerState::Created),
        ("16.0", TrackerState::Created),
    ];

    for (maximum, expected) in cases {
        let (status, _) = labels_status(Some("15.0.0"), None, Some(maximum)).await;
        assert_eq!(status, expected, "maximum {maximum}");
    }
}

#[tokio::test]
async fn test_newer_source_runs_every_minimum_bounded_pipeline() {
    for minimum in ["14.10", "15.0", "15.1", "16.0"] {
        let (status, _) = labels_status(Some("16.4.1"), Some(minimum), None).await;
        assert_eq!(status, TrackerState::Created, "minimum {minimum}");
    }
}

#[tokio::test]
async fn test_unknown_or_unparsable_version_is_compatible() {
    for source_version in [None, Some("nightly"), Some("")] {
        let (status, _) = labels_status(source_version, Some("16.0"), Some("16.0")).await;
        assert_eq!(status, TrackerState::Created, "source {source_version:?}");
    }
}

#[tokio::test]
async fn test_patch_releases_produce_identical_trackers() {
    async fn plan(source_version: &str) -> Vec<(String, TrackerState)> {
        let harness = Harness::new(3);
        let import = harness.create_import(Some(source_version)).await;
        let group = harness
            .store
            .create_entity(NewEntity::group(import.id, "acme"))
            .await
            .unwrap();
        let project = harness
            .store
            .create_entity(NewEntity::project(import.id, "acme/widgets"))
            .await
            .unwrap();
        harness.process.process(import.id).await;

        let mut pairs = Vec::new();
        for entity_id in [group.id, project.id] {
            for tracker in harness.store.trackers_for_entity(entity_id).await.unwrap() {
                pairs.push((tracker.relation, tracker.status));
            }
        }
        pairs
    }

    for (a, b) in [("15.0.0", "15.0.1"), ("14.9.0", "14.9.7"), ("16.2.0", "16.2.3-ee")] {
        assert_eq!(plan(a).await, plan(b).await, "{a} vs {b}");
    }
}

#[tokio::test]
async fn test_skip_notice_describes_the_gate() {
    let (status, harness) = labels_status(Some("15.0.0"), Some("15.1"), None).await;
    assert_eq!(status, TrackerState::Skipped);

    let notices = harness.diagnostics.notices();
    assert_eq!(notices.len(), 1);

    let notice = &notices[0];
    assert_eq!(notice.message, messages::PIPELINE_SKIPPED);
    assert_eq!(notice.importer, IMPORTER_NAME);
    assert_eq!(notice.pipeline, "labels");
    assert_eq!(notice.bulk_import_entity_type, SourceType::Project);
    assert_eq!(notice.source_full_path, "acme/widgets");
    assert_eq!(notice.minimum_source_version.as_deref(), Some("15.1"));
    assert_eq!(notice.maximum_source_version, None);
    assert_eq!(notice.source_version.as_deref(), Some("15.0.0"));
}

#[tokio::test]
async fn test_skip_notice_keeps_bounds_as_written() {
    let (status, harness) = labels_status(Some("16.0.0"), Some("14.10"), Some("15.9")).await;
    assert_eq!(status, TrackerState::Skipped);

    let notice = &harness.diagnostics.notices()[0];
    assert_eq!(notice.minimum_source_version.as_deref(), Some("14.10"));
    assert_eq!(notice.maximum_source_version.as_deref(), Some("15.9"));
}

#[tokio::test]
async fn test_skipped_trackers_never_run() {
    let harness = Harness::with_catalog(bounded_catalog(Some("17.0"), None), 3);
    let import = harness.create_import(Some("16.0.0")).await;
    let entity = harness
        .store
        .create_entity(NewEntity::project(import.id, "acme/widgets"))
        .await
        .unwrap();

    harness.process.process(import.id).await;
    harness.drain(100).await;

    let trackers = harness.store.trackers_for_entity(entity.id).await.unwrap();
    let statuses: Vec<(&str, TrackerState)> = trackers
        .iter()
        .map(|t| (t.relation.as_str(), t.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("project", TrackerState::Finished),
            ("labels", TrackerState::Skipped),
        ]
    );
    assert_eq!(
        harness.import_status(import.id).await,
        bulk_import_core::state_machine::ImportState::Finished
    );
}
