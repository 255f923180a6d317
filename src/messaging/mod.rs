//! # Messaging Module
//!
//! Explicit message passing between the dispatch loop, entity workers and the
//! relation export dispatcher.

pub mod errors;
pub mod jobs;
pub mod scheduler;

pub use errors::{MessagingError, MessagingResult};
pub use jobs::{EntityExportRequest, MigrationJob, ScheduledJob};
pub use scheduler::{ChannelScheduler, JobScheduler};
