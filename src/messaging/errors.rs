//! # Messaging Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessagingError {
    /// The job runner has shut down; nothing can be scheduled any more
    #[error("Job channel closed")]
    ChannelClosed,

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Scheduler rejected {job_type} job: {message}")]
    Rejected { job_type: String, message: String },
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        Self::MessageSerialization {
            message: err.to_string(),
        }
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
