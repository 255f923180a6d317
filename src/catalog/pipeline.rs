//! Pipeline contract and identifier registry.
//!
//! A pipeline moves one relation of one entity. The orchestration core only
//! starts it, waits for it and records the outcome on the tracker; the data
//! transfer itself lives behind this trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::models::{Entity, Tracker};

/// Everything a pipeline run needs to know about its target
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub entity: Entity,
    pub tracker: Tracker,
    /// Source version recorded on the owning import
    pub source_version: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Pipeline '{relation}' failed: {reason}")]
    Failed { relation: String, reason: String },

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
}

impl PipelineError {
    pub fn failed(relation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            relation: relation.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Identifier used by the stage catalog and recorded on trackers
    fn relation(&self) -> &str;

    async fn run(&self, context: &PipelineContext) -> Result<(), PipelineError>;
}

/// Pipeline that only logs its invocation and succeeds.
///
/// Lets the dispatcher binary exercise the full state flow without a transport.
#[derive(Debug, Clone)]
pub struct DryRunPipeline {
    relation: String,
}

impl DryRunPipeline {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
        }
    }
}

#[async_trait]
impl Pipeline for DryRunPipeline {
    fn relation(&self) -> &str {
        &self.relation
    }

    async fn run(&self, context: &PipelineContext) -> Result<(), PipelineError> {
        info!(
            relation = %self.relation,
            entity_id = context.entity.id,
            tracker_id = context.tracker.id,
            source_full_path = %context.entity.source_full_path,
            "Dry run pipeline executed"
        );
        Ok(())
    }
}

/// Identifier → pipeline lookup
#[derive(Clone, Default)]
pub struct PipelineRegistry {
    pipelines: HashMap<String, Arc<dyn Pipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline under its own identifier, replacing any previous one
    pub fn register(&mut self, pipeline: Arc<dyn Pipeline>) -> &mut Self {
        self.pipelines
            .insert(pipeline.relation().to_string(), pipeline);
        self
    }

    pub fn with(mut self, pipeline: Arc<dyn Pipeline>) -> Self {
        self.register(pipeline);
        self
    }

    /// Registry with a [`DryRunPipeline`] for each identifier
    pub fn dry_run<I, S>(relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        relations.into_iter().fold(Self::new(), |registry, relation| {
            registry.with(Arc::new(DryRunPipeline::new(relation)))
        })
    }

    pub fn resolve(&self, relation: &str) -> Option<Arc<dyn Pipeline>> {
        self.pipelines.get(relation).cloned()
    }

    pub fn contains(&self, relation: &str) -> bool {
        self.pipelines.contains_key(relation)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut relations: Vec<&String> = self.pipelines.keys().collect();
        relations.sort();
        f.debug_struct("PipelineRegistry")
            .field("relations", &relations)
            .finish()
    }
}
