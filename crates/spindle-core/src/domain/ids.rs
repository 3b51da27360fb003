//! Domain identifiers (strongly-typed IDs).
//!
//! Queue and task identifiers are both opaque, non-blank strings issued by the
//! remote store. They share one generic implementation, `Id<T>`, and a
//! zero-sized marker keeps a `QueueId` from being passed where a `TaskId` is
//! expected.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::errors::ValidationError;

/// Marker trait for each ID kind.
///
/// `kind()` is used in validation messages ("queue id", "task id"). The
/// supertraits let `Id<T>` derive its comparisons for every marker.
pub trait IdMarker:
    fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord + Send + Sync + 'static
{
    fn kind() -> &'static str;
}

/// Generic, non-blank string identifier.
///
/// Equality, hashing and ordering compare the wrapped value only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String", bound = "")]
pub struct Id<T: IdMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Create an ID, rejecting blank values.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::BlankIdentifier(T::kind()));
        }
        Ok(Self {
            value,
            _marker: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: IdMarker> TryFrom<String> for Id<T> {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<T: IdMarker> From<Id<T>> for String {
    fn from(id: Id<T>) -> Self {
        id.value
    }
}

/// A ULID always renders to 26 characters, so this conversion cannot fail.
impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self {
            value: ulid.to_string(),
            _marker: PhantomData,
        }
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ========================================
// Markers
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueKind {}

impl IdMarker for QueueKind {
    fn kind() -> &'static str {
        "queue id"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {}

impl IdMarker for TaskKind {
    fn kind() -> &'static str {
        "task id"
    }
}

/// Name of a queue on the remote store.
pub type QueueId = Id<QueueKind>;

/// Identifier of a task on the remote store.
pub type TaskId = Id<TaskKind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_rejected() {
        let err = QueueId::new("   ").unwrap_err();
        assert_eq!(err, ValidationError::BlankIdentifier("queue id"));
        assert!(TaskId::new("").is_err());
    }

    #[test]
    fn ids_compare_by_value() {
        let a = TaskId::new("t-1").unwrap();
        let b = TaskId::new("t-1".to_string()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "t-1");
    }

    #[test]
    fn deserializing_a_blank_id_fails() {
        let ok: QueueId = serde_json::from_str("\"orders\"").unwrap();
        assert_eq!(ok.as_str(), "orders");

        let err = serde_json::from_str::<QueueId>("\"\"");
        assert!(err.is_err());
    }

    #[test]
    fn ulid_ids_serialize_as_plain_strings() {
        let ulid = Ulid::new();
        let id: TaskId = ulid.into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{ulid}\""));
    }
}
