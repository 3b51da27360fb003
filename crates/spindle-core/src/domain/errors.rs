//! Errors - domain-level error types.
//!
//! `StoreError` is what every query/store port returns. A version mismatch is
//! its own variant (`Conflict`) so callers have to decide explicitly whether
//! "someone else got there first" is a skip, a no-op, or worth retrying.

use thiserror::Error;

use super::command::CommandType;
use super::ids::TaskId;

/// Invalid values rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be blank")]
    BlankIdentifier(&'static str),

    #[error("unknown task status: {0}")]
    UnknownStatus(String),

    #[error("unknown close result: {0}")]
    UnknownCloseResult(String),
}

/// Failure of a query or store operation against the task store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Optimistic-version mismatch, or the task is not in a state that
    /// accepts the command.
    #[error("conflict when attempting to {command} task {task_id}")]
    Conflict {
        command: CommandType,
        task_id: TaskId,
    },

    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Network or server failure. Usually transient.
    #[error("task store unavailable: {0}")]
    Remote(String),

    /// The store rejected the request itself (bad page reference, bad filter).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    pub fn conflict(command: CommandType, task_id: &TaskId) -> Self {
        Self::Conflict {
            command,
            task_id: task_id.clone(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
