//! Error taxonomy for the concurrency substrate.
//!
//! Fatal construction errors (`BadConfig`, OS primitive creation failure)
//! panic immediately rather than returning a `Result`, matching the
//! abort-on-fatal-init convention of the system this crate is modeled on.
//! Recoverable conditions are surfaced to callers as `bool`/`Option` per
//! operation, not as this enum — `ConcurError` exists for the cases that
//! genuinely need to travel as a value (e.g. worker start failures that a
//! caller may want to log or retry).

use core::fmt;

/// Errors that can occur in pool/executor operations that return a `Result`
/// rather than a plain `bool`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcurError {
    /// Submission rejected because the shared queue had no free slot within
    /// the requested blocking budget.
    QueueFull,

    /// Submission rejected because the pool/executor is not in the running
    /// state.
    NotRunning,

    /// Fewer workers could be started than requested; carries the number
    /// that actually started.
    WorkerStartFailure { started: usize, requested: usize },
}

impl fmt::Display for ConcurError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurError::QueueFull => write!(f, "queue full"),
            ConcurError::NotRunning => write!(f, "pool is not running"),
            ConcurError::WorkerStartFailure { started, requested } => {
                write!(f, "started {started} of {requested} requested workers")
            }
        }
    }
}

impl std::error::Error for ConcurError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ConcurError::QueueFull), "queue full");
        assert_eq!(
            format!("{}", ConcurError::WorkerStartFailure { started: 2, requested: 4 }),
            "started 2 of 4 requested workers"
        );
    }
}
