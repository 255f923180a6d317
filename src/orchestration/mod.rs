//! # Orchestration
//!
//! The dispatch loop and the workers it drives.
//!
//! ## Components
//!
//! - [`ProcessService`]: one pass of the per-import dispatch loop
//! - [`TrackerMaterializer`]: catalog → tracker rows with version gating
//! - [`ImportFinalizer`]: aggregate entity status → terminal import status
//! - [`EntityWorker`]: stage-by-stage tracker execution for one entity
//! - [`ImportWatchdog`]: times out imports that ran too long
//! - [`JobRunner`]: routes scheduled jobs to the components above
//! - [`MigrationSystem`]: wiring of all of the above

pub mod bootstrap;
pub mod diagnostics;
pub mod entity_worker;
pub mod error_reporting;
pub mod import_finalizer;
pub mod import_watchdog;
pub mod job_runner;
pub mod process_service;
pub mod tracker_materializer;

pub use bootstrap::{MigrationSystem, ResumeSummary, SystemComponents};
pub use diagnostics::{DiagnosticLogger, SkipNotice, TracingDiagnosticLogger};
pub use entity_worker::{EntityRunOutcome, EntityWorker};
pub use error_reporting::{ErrorReporter, TracingErrorReporter};
pub use import_finalizer::{FinalizationAction, ImportFinalizer};
pub use import_watchdog::ImportWatchdog;
pub use job_runner::JobRunner;
pub use process_service::{ProcessOutcome, ProcessService};
pub use tracker_materializer::{TrackerMaterializer, TrackerPlan};
