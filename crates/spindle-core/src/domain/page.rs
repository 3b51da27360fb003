//! One page of a task listing.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::task::Task;

/// Opaque cursor naming a page boundary. Issued by the store and handed back
/// to it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageReference(String);

impl PageReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tasks of one page plus links to its neighbours.
///
/// A missing `next` means this is the last page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TasksPage {
    pub tasks: Vec<Task>,
    pub previous: Option<PageReference>,
    pub next: Option<PageReference>,
}

impl TasksPage {
    pub fn new(
        tasks: Vec<Task>,
        previous: Option<PageReference>,
        next: Option<PageReference>,
    ) -> Self {
        Self {
            tasks,
            previous,
            next,
        }
    }

    /// A page with no following page.
    pub fn last(tasks: Vec<Task>) -> Self {
        Self::new(tasks, None, None)
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}
