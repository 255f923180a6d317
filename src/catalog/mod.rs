//! # Stage Catalog
//!
//! Static, ordered description of which pipelines run for a group or project
//! entity, at which stage, and for which source versions.
//!
//! ## Overview
//!
//! The catalog is built once at startup from [`StagedPipeline`] rows and a
//! [`PipelineRegistry`]. Every row's identifier is resolved against the
//! registry and its version bounds are parsed during [`StageCatalogBuilder::build`],
//! so a misconfigured catalog fails at startup rather than mid-import. After
//! construction the catalog is an immutable value shared behind an `Arc`.

pub mod pipeline;
pub mod stage_catalog;
pub mod standard;

use thiserror::Error;

pub use pipeline::{DryRunPipeline, Pipeline, PipelineContext, PipelineError, PipelineRegistry};
pub use stage_catalog::{CatalogEntry, StageCatalog, StageCatalogBuilder, StagedPipeline};

/// Errors raised while building the catalog
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Pipeline '{0}' is not registered")]
    UnknownPipeline(String),

    #[error("Invalid version bound for pipeline '{relation}': {reason}")]
    InvalidVersionBound { relation: String, reason: String },

    #[error("Pipeline '{relation}' listed twice for {source_type}")]
    DuplicateRelation {
        source_type: String,
        relation: String,
    },
}
