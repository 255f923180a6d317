use serde::{Deserialize, Serialize};

use super::states::{EntityState, ImportState, TrackerState};

/// Events that can trigger import state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ImportEvent {
    /// First dispatch of the import
    Start,
    /// Every entity terminal, at least one finished
    Finish,
    /// Every entity terminal with none finished, or dispatch aborted
    Fail(String),
    /// Watchdog deadline passed
    TimeOut,
}

impl ImportEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Fail(_) => "fail",
            Self::TimeOut => "time_out",
        }
    }

    pub fn target_state(&self) -> ImportState {
        match self {
            Self::Start => ImportState::Started,
            Self::Finish => ImportState::Finished,
            Self::Fail(_) => ImportState::Failed,
            Self::TimeOut => ImportState::Timeout,
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

/// Events that can trigger entity state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EntityEvent {
    Start,
    Finish,
    Fail(String),
    Skip,
}

impl EntityEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Fail(_) => "fail",
            Self::Skip => "skip",
        }
    }

    pub fn target_state(&self) -> EntityState {
        match self {
            Self::Start => EntityState::Started,
            Self::Finish => EntityState::Finished,
            Self::Fail(_) => EntityState::Failed,
            Self::Skip => EntityState::Skipped,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

/// Events that can trigger tracker state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TrackerEvent {
    Start,
    Finish,
    Fail(String),
    Skip,
}

impl TrackerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Fail(_) => "fail",
            Self::Skip => "skip",
        }
    }

    pub fn target_state(&self) -> TrackerState {
        match self {
            Self::Start => TrackerState::Started,
            Self::Finish => TrackerState::Finished,
            Self::Fail(_) => TrackerState::Failed,
            Self::Skip => TrackerState::Skipped,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
