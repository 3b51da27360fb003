//! Reply model: what business logic decided about a task.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of the consumer function for one task.
///
/// - `Success`: close the task as successful.
/// - `Fail`: close the task as failed; it will not run again.
/// - `Retry`: give the task back to the queue (requeue, or reschedule when a
///   retry delay is configured).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    Success,
    Fail {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Retry {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl Reply {
    pub fn success() -> Self {
        Reply::Success
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Reply::Fail {
            reason: Some(reason.into()),
        }
    }

    pub fn retry(reason: impl Into<String>) -> Self {
        Reply::Retry {
            reason: Some(reason.into()),
        }
    }

    /// Retry with no reason; what a failing consumer function turns into.
    pub fn retry_unexplained() -> Self {
        Reply::Retry { reason: None }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Fail { .. })
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Reply::Retry { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Reply::Success => None,
            Reply::Fail { reason } | Reply::Retry { reason } => reason.as_deref(),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Reply::Success => "success",
            Reply::Fail { .. } => "fail",
            Reply::Retry { .. } => "retry",
        };
        match self.reason() {
            Some(reason) => write!(f, "{kind}({reason})"),
            None => f.write_str(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_is_tagged_by_type() {
        let v = serde_json::to_value(Reply::fail("bad data")).unwrap();
        assert_eq!(v["type"], "FAIL");
        assert_eq!(v["reason"], "bad data");

        let v = serde_json::to_value(Reply::success()).unwrap();
        assert_eq!(v, serde_json::json!({"type": "SUCCESS"}));
    }

    #[test]
    fn display_includes_reason_when_present() {
        assert_eq!(Reply::retry("busy").to_string(), "retry(busy)");
        assert_eq!(Reply::retry_unexplained().to_string(), "retry");
        assert_eq!(Reply::retry_unexplained().reason(), None);
    }
}
