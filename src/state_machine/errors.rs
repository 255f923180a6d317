use thiserror::Error;

/// Errors raised while applying a status transition.
///
/// A transition rejected by the predecessor check is not an error; the state
/// machines report it as `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// The store could not be reached or answered with an error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("Failed to move {record} {record_id} to {to}: {reason}")]
    CompareAndSetFailed {
        record: &'static str,
        record_id: i64,
        to: String,
        reason: String,
    },

    #[error("Failed to read status of {record} {record_id}: {reason}")]
    LookupFailed {
        record: &'static str,
        record_id: i64,
        reason: String,
    },
}

impl PersistenceError {
    pub fn compare_and_set(
        record: &'static str,
        record_id: i64,
        to: impl ToString,
        reason: impl ToString,
    ) -> Self {
        Self::CompareAndSetFailed {
            record,
            record_id,
            to: to.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn lookup(record: &'static str, record_id: i64, reason: impl ToString) -> Self {
        Self::LookupFailed {
            record,
            record_id,
            reason: reason.to_string(),
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_names_the_record() {
        let err: StateMachineError =
            PersistenceError::compare_and_set("tracker", 7, "finished", "connection reset").into();
        assert_eq!(
            err.to_string(),
            "Failed to move tracker 7 to finished: connection reset"
        );
    }
}
