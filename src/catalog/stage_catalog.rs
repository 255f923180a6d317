use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::pipeline::{Pipeline, PipelineRegistry};
use super::CatalogError;
use crate::models::SourceType;
use crate::versioning::VersionBounds;

/// Unresolved catalog row as written in a stage table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedPipeline {
    pub relation: String,
    pub stage: u32,
    pub minimum_source_version: Option<String>,
    pub maximum_source_version: Option<String>,
}

impl StagedPipeline {
    pub fn new(relation: impl Into<String>, stage: u32) -> Self {
        Self {
            relation: relation.into(),
            stage,
            minimum_source_version: None,
            maximum_source_version: None,
        }
    }

    pub fn minimum(mut self, version: impl Into<String>) -> Self {
        self.minimum_source_version = Some(version.into());
        self
    }

    pub fn maximum(mut self, version: impl Into<String>) -> Self {
        self.maximum_source_version = Some(version.into());
        self
    }
}

/// Resolved catalog row
#[derive(Clone)]
pub struct CatalogEntry {
    pub relation: String,
    pub stage: u32,
    pub bounds: VersionBounds,
    /// Bounds as written in the stage table, for operator-facing records
    pub minimum_as_written: Option<String>,
    pub maximum_as_written: Option<String>,
    pub pipeline: Arc<dyn Pipeline>,
}

impl CatalogEntry {
    /// Whether this pipeline should run against `source_version`.
    ///
    /// Absent or unparsable versions are treated as compatible.
    pub fn is_compatible(&self, source_version: Option<&str>) -> bool {
        self.bounds.compare(source_version)
    }

    /// Minimum bound as configured, e.g. `14.10` rather than `14.10.0`
    pub fn minimum_source_version(&self) -> Option<&str> {
        self.minimum_as_written.as_deref()
    }

    pub fn maximum_source_version(&self) -> Option<&str> {
        self.maximum_as_written.as_deref()
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("relation", &self.relation)
            .field("stage", &self.stage)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

/// Immutable stage tables for groups and projects, ordered by stage
#[derive(Debug, Clone, Default)]
pub struct StageCatalog {
    group: Vec<CatalogEntry>,
    project: Vec<CatalogEntry>,
}

impl StageCatalog {
    pub fn builder() -> StageCatalogBuilder {
        StageCatalogBuilder::default()
    }

    /// Catalog built from the standard group and project tables
    pub fn standard(registry: &PipelineRegistry) -> Result<Self, CatalogError> {
        Self::builder()
            .group(super::standard::group_pipelines())
            .project(super::standard::project_pipelines())
            .build(registry)
    }

    /// Entries for `source_type` in stage order (catalog order within a stage)
    pub fn pipelines_for(&self, source_type: SourceType) -> &[CatalogEntry] {
        match source_type {
            SourceType::Group => &self.group,
            SourceType::Project => &self.project,
        }
    }

    pub fn find(&self, source_type: SourceType, relation: &str) -> Option<&CatalogEntry> {
        self.pipelines_for(source_type)
            .iter()
            .find(|entry| entry.relation == relation)
    }

    /// Distinct stage indices for `source_type`, ascending
    pub fn stages_for(&self, source_type: SourceType) -> Vec<u32> {
        let mut stages: Vec<u32> = self
            .pipelines_for(source_type)
            .iter()
            .map(|entry| entry.stage)
            .collect();
        stages.dedup();
        stages
    }
}

#[derive(Debug, Clone, Default)]
pub struct StageCatalogBuilder {
    group: Vec<StagedPipeline>,
    project: Vec<StagedPipeline>,
}

impl StageCatalogBuilder {
    pub fn group(mut self, rows: impl IntoIterator<Item = StagedPipeline>) -> Self {
        self.group.extend(rows);
        self
    }

    pub fn project(mut self, rows: impl IntoIterator<Item = StagedPipeline>) -> Self {
        self.project.extend(rows);
        self
    }

    /// Parse bounds and resolve every identifier against `registry`
    pub fn build(self, registry: &PipelineRegistry) -> Result<StageCatalog, CatalogError> {
        let catalog = StageCatalog {
            group: resolve(SourceType::Group, self.group, registry)?,
            project: resolve(SourceType::Project, self.project, registry)?,
        };

        debug!(
            group_pipelines = catalog.group.len(),
            project_pipelines = catalog.project.len(),
            "Stage catalog built"
        );

        Ok(catalog)
    }
}

fn resolve(
    source_type: SourceType,
    rows: Vec<StagedPipeline>,
    registry: &PipelineRegistry,
) -> Result<Vec<CatalogEntry>, CatalogError> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(rows.len());

    for row in rows {
        if !seen.insert(row.relation.clone()) {
            return Err(CatalogError::DuplicateRelation {
                source_type: source_type.to_string(),
                relation: row.relation,
            });
        }

        let bounds = VersionBounds::parse(
            row.minimum_source_version.as_deref(),
            row.maximum_source_version.as_deref(),
        )
        .map_err(|e| CatalogError::InvalidVersionBound {
            relation: row.relation.clone(),
            reason: e.to_string(),
        })?;

        let pipeline = registry
            .resolve(&row.relation)
            .ok_or_else(|| CatalogError::UnknownPipeline(row.relation.clone()))?;

        entries.push(CatalogEntry {
            relation: row.relation,
            stage: row.stage,
            bounds,
            minimum_as_written: row.minimum_source_version,
            maximum_as_written: row.maximum_source_version,
            pipeline,
        });
    }

    // Stable: catalog order is kept within a stage
    entries.sort_by_key(|entry| entry.stage);
    Ok(entries)
}
