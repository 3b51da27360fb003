//! Task status as reported by the task store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

/// Status of a task on the remote store.
///
/// State transitions are enforced by the store, not by this client:
/// - waiting -> ready (trigger date reached)
/// - ready -> started (claim)
/// - started -> ready (requeue) / waiting (reschedule) / closed
/// - any non-closed -> cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Waiting,
    Ready,
    Started,
    Closed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Ready => "ready",
            TaskStatus::Started => "started",
            TaskStatus::Closed => "closed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_waiting(self) -> bool {
        self == TaskStatus::Waiting
    }

    pub fn is_ready(self) -> bool {
        self == TaskStatus::Ready
    }

    pub fn is_started(self) -> bool {
        self == TaskStatus::Started
    }

    pub fn is_closed(self) -> bool {
        self == TaskStatus::Closed
    }

    pub fn is_cancelled(self) -> bool {
        self == TaskStatus::Cancelled
    }

    /// Closed and cancelled tasks never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Closed | TaskStatus::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(TaskStatus::Waiting),
            "ready" => Ok(TaskStatus::Ready),
            "started" => Ok(TaskStatus::Started),
            "closed" => Ok(TaskStatus::Closed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Result recorded when a task is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseResult {
    Success,
    Failure,
}

impl fmt::Display for CloseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseResult::Success => f.write_str("success"),
            CloseResult::Failure => f.write_str("failure"),
        }
    }
}

impl FromStr for CloseResult {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(CloseResult::Success),
            "failure" => Ok(CloseResult::Failure),
            other => Err(ValidationError::UnknownCloseResult(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::waiting(TaskStatus::Waiting, "waiting")]
    #[case::ready(TaskStatus::Ready, "ready")]
    #[case::started(TaskStatus::Started, "started")]
    #[case::closed(TaskStatus::Closed, "closed")]
    #[case::cancelled(TaskStatus::Cancelled, "cancelled")]
    fn status_uses_lowercase_wire_names(#[case] status: TaskStatus, #[case] name: &str) {
        assert_eq!(status.to_string(), name);
        assert_eq!(name.parse::<TaskStatus>().unwrap(), status);
        assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{name}\""));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "paused".parse::<TaskStatus>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownStatus("paused".into()));
    }

    #[test]
    fn only_closed_and_cancelled_are_terminal() {
        assert!(TaskStatus::Closed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Started.is_terminal());
        assert!(TaskStatus::Started.is_started());
    }
}
