//! # Tracker Materializer
//!
//! Turns the stage catalog into the tracker rows for one entity. Every
//! catalog entry for the entity's source type yields exactly one tracker;
//! entries whose version window excludes the import's source version are
//! written as `skipped` and reported through the [`DiagnosticLogger`].
//!
//! Planning is pure. Skip notices are only emitted once the plan has actually
//! been persisted, so a promotion that loses its slot reports nothing.

use std::sync::Arc;

use super::diagnostics::{DiagnosticLogger, SkipNotice};
use crate::catalog::StageCatalog;
use crate::models::{Entity, Import, NewTracker};
use crate::state_machine::TrackerState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerPlan {
    pub trackers: Vec<NewTracker>,
    pub skipped: Vec<SkipNotice>,
}

impl TrackerPlan {
    pub fn created_count(&self) -> usize {
        self.trackers
            .iter()
            .filter(|tracker| tracker.status == TrackerState::Created)
            .count()
    }
}

#[derive(Clone)]
pub struct TrackerMaterializer {
    catalog: Arc<StageCatalog>,
    diagnostics: Arc<dyn DiagnosticLogger>,
}

impl TrackerMaterializer {
    pub fn new(catalog: Arc<StageCatalog>, diagnostics: Arc<dyn DiagnosticLogger>) -> Self {
        Self {
            catalog,
            diagnostics,
        }
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    pub fn plan(&self, import: &Import, entity: &Entity) -> TrackerPlan {
        let source_version = import.source_version.as_deref();
        let mut plan = TrackerPlan::default();

        for entry in self.catalog.pipelines_for(entity.source_type) {
            let status = if entry.is_compatible(source_version) {
                TrackerState::Created
            } else {
                plan.skipped
                    .push(SkipNotice::new(entity, entry, source_version));
                TrackerState::Skipped
            };

            plan.trackers.push(NewTracker {
                stage: entry.stage,
                relation: entry.relation.clone(),
                status,
            });
        }

        plan
    }

    pub fn report_skipped(&self, plan: &TrackerPlan) {
        for notice in &plan.skipped {
            self.diagnostics.pipeline_skipped(notice);
        }
    }
}
