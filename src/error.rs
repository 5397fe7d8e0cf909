use thiserror::Error;

use crate::core::operation::OperationId;

/// Misuse of the scheduler API.
///
/// Work that cannot run is never an error: actions fold missing
/// prerequisites into a `Skipped` outcome instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("operation not found: {0}")]
    UnknownOperation(OperationId),

    #[error("operation already finished: {0}")]
    AlreadyFinished(OperationId),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
