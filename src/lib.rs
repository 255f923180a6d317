#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Bulk Import Core
//!
//! Orchestration core for migrating groups and projects between instances
//! through versioned, resumable pipeline stages.
//!
//! ## Overview
//!
//! An **import** owns **entities** (one per group or project to migrate). When
//! an entity is first dispatched it receives one **tracker** per pipeline in
//! the stage catalog for its source type. Pipelines that the source instance's
//! version cannot serve are recorded as skipped. Entity workers then run the
//! trackers stage by stage.
//!
//! The dispatch loop ([`orchestration::ProcessService`]) is stateless and
//! re-enqueues itself: each pass re-reads persisted state, promotes at most
//! `batch_size - started` entities and either settles the import or schedules
//! the next pass. Progress therefore survives process restarts.
//!
//! ## Module Organization
//!
//! - [`versioning`] - Source version parsing and compatibility windows
//! - [`catalog`] - Stage catalog and pipeline registry
//! - [`models`] - Import, entity and tracker records
//! - [`state_machine`] - Status enums, predecessor tables and transitions
//! - [`store`] - Persistence boundary (in-memory and PostgreSQL)
//! - [`messaging`] - Job messages and schedulers
//! - [`orchestration`] - Dispatch loop, entity worker, watchdog, job runner
//! - [`export`] - Relation export dispatch with lease-based deduplication
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-wide error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bulk_import_core::config::MigrationConfig;
//! use bulk_import_core::models::{NewEntity, NewImport};
//! use bulk_import_core::orchestration::{MigrationSystem, SystemComponents};
//! use bulk_import_core::store::{InMemoryMigrationStore, MigrationStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryMigrationStore::new());
//! let import = store.create_import(NewImport::with_source_version("16.2.0")).await?;
//! store.create_entity(NewEntity::project(import.id, "acme/widgets")).await?;
//!
//! let (system, receiver) =
//!     MigrationSystem::build(&MigrationConfig::default(), store, SystemComponents::dry_run())?;
//! let outcome = system.process.process(import.id).await;
//! system.runner.clone().spawn(receiver);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;
pub mod versioning;

pub use catalog::{Pipeline, PipelineRegistry, StageCatalog, StagedPipeline};
pub use config::{ConfigManager, MigrationConfig};
pub use error::{MigrationError, MigrationResult};
pub use export::{RelationExportDispatcher, RelationExportRequest};
pub use messaging::{ChannelScheduler, JobScheduler, MigrationJob};
pub use models::{Entity, Import, SourceType, Tracker};
pub use orchestration::{MigrationSystem, ProcessOutcome, ProcessService};
pub use state_machine::{EntityState, ImportState, TrackerState};
pub use store::{InMemoryMigrationStore, MigrationStore, PgMigrationStore};
pub use versioning::{SourceVersion, VersionBounds};
