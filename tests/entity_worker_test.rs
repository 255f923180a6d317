//! Stage-ordered tracker execution for a single entity.

mod common;

use std::sync::Arc;

use bulk_import_core::catalog::{Pipeline, StageCatalog, StagedPipeline};
use bulk_import_core::models::NewEntity;
use bulk_import_core::orchestration::{EntityRunOutcome, ProcessOutcome};
use bulk_import_core::state_machine::{
    EntityState, ImportEvent, ImportState, ImportStateMachine, TrackerState,
};
use bulk_import_core::store::MigrationStore;

use common::{registry_with, CountingPipeline, FailingPipeline, Harness};

fn three_stage_catalog(overrides: Vec<Arc<dyn Pipeline>>) -> StageCatalog {
    StageCatalog::builder()
        .project([
            StagedPipeline::new("project", 0),
            StagedPipeline::new("labels", 1),
            StagedPipeline::new("milestones", 1),
            StagedPipeline::new("issues", 2),
        ])
        .build(&registry_with(overrides))
        .expect("catalog builds")
}

async fn started_project(harness: &Harness) -> (i64, i64) {
    let import = harness.create_import(Some("16.0.0")).await;
    let entity = harness
        .store
        .create_entity(NewEntity::project(import.id, "acme/widgets"))
        .await
        .unwrap();
    harness.process.process(import.id).await;
    harness.scheduler.take();
    (import.id, entity.id)
}

async fn statuses(harness: &Harness, entity_id: i64) -> Vec<(String, TrackerState)> {
    harness
        .store
        .trackers_for_entity(entity_id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| (t.relation, t.status))
        .collect()
}

#[tokio::test]
async fn test_one_stage_per_pass() {
    let harness = Harness::with_catalog(three_stage_catalog(vec![]), 3);
    let (_, entity_id) = started_project(&harness).await;

    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();
    assert_eq!(outcome, EntityRunOutcome::Advanced { stage: 0, ran: 1 });
    assert_eq!(
        statuses(&harness, entity_id).await,
        vec![
            ("project".to_string(), TrackerState::Finished),
            ("labels".to_string(), TrackerState::Created),
            ("milestones".to_string(), TrackerState::Created),
            ("issues".to_string(), TrackerState::Created),
        ]
    );
    assert_eq!(harness.scheduler.entity_runs(), vec![entity_id]);

    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();
    assert_eq!(outcome, EntityRunOutcome::Advanced { stage: 1, ran: 2 });
    let after_stage_one = statuses(&harness, entity_id).await;
    assert_eq!(after_stage_one[3].1, TrackerState::Created);

    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();
    assert_eq!(outcome, EntityRunOutcome::Completed(EntityState::Finished));

    let entity = harness.store.find_entity(entity_id).await.unwrap().unwrap();
    assert_eq!(entity.status, EntityState::Finished);
}

#[tokio::test]
async fn test_failed_pipeline_fails_the_entity() {
    let issues = CountingPipeline::new("issues");
    let overrides: Vec<Arc<dyn Pipeline>> = vec![FailingPipeline::new("labels"), issues.clone()];
    let harness = Harness::with_catalog(three_stage_catalog(overrides), 3);
    let (import_id, entity_id) = started_project(&harness).await;

    harness.entity_worker.perform(entity_id).await.unwrap();
    harness.process.process(import_id).await;
    harness.drain(100).await;

    let trackers = statuses(&harness, entity_id).await;
    assert!(trackers.contains(&("labels".to_string(), TrackerState::Failed)));
    assert!(trackers.contains(&("milestones".to_string(), TrackerState::Finished)));
    assert_eq!(issues.runs(), 1);

    let entity = harness.store.find_entity(entity_id).await.unwrap().unwrap();
    assert_eq!(entity.status, EntityState::Failed);
    assert_eq!(harness.import_status(import_id).await, ImportState::Failed);
}

#[tokio::test]
async fn test_later_stage_waits_for_running_tracker() {
    let harness = Harness::with_catalog(three_stage_catalog(vec![]), 3);
    let (_, entity_id) = started_project(&harness).await;
    harness.entity_worker.perform(entity_id).await.unwrap();
    harness.scheduler.take();

    // Another worker holds one of the stage 1 trackers
    let trackers = harness.store.trackers_for_entity(entity_id).await.unwrap();
    let labels = trackers.iter().find(|t| t.relation == "labels").unwrap();
    assert!(harness
        .store
        .compare_and_set_tracker_status(labels.id, &[TrackerState::Created], TrackerState::Started)
        .await
        .unwrap());

    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();
    assert_eq!(outcome, EntityRunOutcome::Advanced { stage: 1, ran: 1 });

    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();
    assert_eq!(outcome, EntityRunOutcome::Advanced { stage: 1, ran: 0 });
    assert_eq!(
        statuses(&harness, entity_id).await[3],
        ("issues".to_string(), TrackerState::Created)
    );

    let retries = harness.scheduler.jobs();
    assert_eq!(retries.len(), 2);
    assert!(retries[0].is_immediate());
    assert!(!retries[1].is_immediate());
}

#[tokio::test]
async fn test_abandoned_tracker_is_failed_and_entity_settles() {
    let harness = Harness::with_catalog(three_stage_catalog(vec![]), 3);
    let (import_id, entity_id) = started_project(&harness).await;

    // A worker claimed the stage 0 tracker and died before finishing it
    let trackers = harness.store.trackers_for_entity(entity_id).await.unwrap();
    let project = trackers.iter().find(|t| t.relation == "project").unwrap();
    assert!(harness
        .store
        .compare_and_set_tracker_status(project.id, &[TrackerState::Created], TrackerState::Started)
        .await
        .unwrap());
    assert!(harness
        .store
        .backdate_tracker(project.id, chrono::Utc::now() - chrono::Duration::hours(5)));

    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();
    assert_eq!(outcome, EntityRunOutcome::Advanced { stage: 0, ran: 0 });
    assert_eq!(
        statuses(&harness, entity_id).await[0],
        ("project".to_string(), TrackerState::Failed)
    );
    let retries = harness.scheduler.take();
    assert_eq!(retries.len(), 1);
    assert!(retries[0].is_immediate());

    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();
    assert_eq!(outcome, EntityRunOutcome::Advanced { stage: 1, ran: 2 });
    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();
    assert_eq!(outcome, EntityRunOutcome::Completed(EntityState::Failed));

    assert_eq!(harness.process.process(import_id).await, ProcessOutcome::Failed);
    assert_eq!(harness.import_status(import_id).await, ImportState::Failed);
}

#[tokio::test]
async fn test_recently_started_tracker_is_left_running() {
    let harness = Harness::with_catalog(three_stage_catalog(vec![]), 3);
    let (_, entity_id) = started_project(&harness).await;

    let trackers = harness.store.trackers_for_entity(entity_id).await.unwrap();
    let project = trackers.iter().find(|t| t.relation == "project").unwrap();
    harness
        .store
        .compare_and_set_tracker_status(project.id, &[TrackerState::Created], TrackerState::Started)
        .await
        .unwrap();

    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();

    assert_eq!(outcome, EntityRunOutcome::Advanced { stage: 0, ran: 0 });
    assert_eq!(
        statuses(&harness, entity_id).await[0],
        ("project".to_string(), TrackerState::Started)
    );
    assert!(!harness.scheduler.jobs()[0].is_immediate());
}

#[tokio::test]
async fn test_entity_of_terminal_import_is_failed() {
    let harness = Harness::with_catalog(three_stage_catalog(vec![]), 3);
    let (import_id, entity_id) = started_project(&harness).await;

    ImportStateMachine::new(import_id, harness.store.clone())
        .transition(ImportEvent::TimeOut)
        .await
        .unwrap();

    let outcome = harness.entity_worker.perform(entity_id).await.unwrap();

    assert_eq!(outcome, EntityRunOutcome::Completed(EntityState::Failed));
    assert!(statuses(&harness, entity_id)
        .await
        .iter()
        .all(|(_, status)| *status == TrackerState::Created));
}

#[tokio::test]
async fn test_inactive_entities_are_left_alone() {
    let harness = Harness::with_catalog(three_stage_catalog(vec![]), 3);
    let import = harness.create_import(None).await;
    let waiting = harness
        .store
        .create_entity(NewEntity::project(import.id, "acme/waiting"))
        .await
        .unwrap();

    assert_eq!(
        harness.entity_worker.perform(waiting.id).await.unwrap(),
        EntityRunOutcome::Inactive(EntityState::Created)
    );
    assert_eq!(
        harness.entity_worker.perform(999).await.unwrap(),
        EntityRunOutcome::NotFound
    );
    assert!(harness.scheduler.jobs().is_empty());
}
