//! # Relation Export
//!
//! Source-side export of portable relations: export configuration, the
//! per-relation lease that deduplicates concurrent requests, and the
//! dispatcher that picks the batched or single-shot exporter.

pub mod config;
pub mod dispatcher;
pub mod lease;
pub mod request_handler;
pub mod types;

pub use config::{ExportConfiguration, StaticExportConfiguration};
pub use dispatcher::{
    DryRunExporter, ExportError, ExportJob, ExportOutcome, RelationExportDispatcher,
    RelationExporter,
};
pub use lease::{ExportLease, ExportLeaseRegistry};
pub use request_handler::{ExportRequestHandler, RelationFanOutHandler};
pub use types::{ExportMode, LeaseKey, Portable, PortableKind, RelationExportRequest, UserId};
