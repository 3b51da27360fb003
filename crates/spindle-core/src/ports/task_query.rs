//! TaskQuery port - read-only lookups and paged listings.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Filter, PageReference, QueueId, StoreError, Task, TaskId, TaskStatus, TasksPage};
use crate::paging::{GlobalIterator, QueueIterator};

/// Read side of the task store.
///
/// The two `retrieve_*` methods are the page loaders behind the lazy
/// iterators; most callers want `TaskQueryServiceExt` instead.
#[async_trait]
pub trait TaskQueryService: Send + Sync {
    /// Look a task up by id. A missing task is `Ok(None)`, not an error.
    async fn find(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// One page of the tasks in `queue` with `status` matching `filters`.
    async fn retrieve_queue_page(
        &self,
        queue: &QueueId,
        status: TaskStatus,
        filters: &[Filter],
        page: Option<&PageReference>,
    ) -> Result<TasksPage, StoreError>;

    /// One page of all tasks matching `filters`, across every queue.
    async fn retrieve_page(
        &self,
        filters: &[Filter],
        page: Option<&PageReference>,
    ) -> Result<TasksPage, StoreError>;
}

/// Lazy, paged listings over a shared query service.
pub trait TaskQueryServiceExt {
    /// Iterate the tasks in `queue` with `status`, page by page.
    fn find_in_queue(&self, queue: &QueueId, status: TaskStatus, filters: Vec<Filter>)
    -> QueueIterator;

    /// Iterate every task matching `filters`, page by page.
    fn find_matching(&self, filters: Vec<Filter>) -> GlobalIterator;
}

impl TaskQueryServiceExt for Arc<dyn TaskQueryService> {
    fn find_in_queue(
        &self,
        queue: &QueueId,
        status: TaskStatus,
        filters: Vec<Filter>,
    ) -> QueueIterator {
        QueueIterator::for_queue(Arc::clone(self), queue.clone(), status, filters)
    }

    fn find_matching(&self, filters: Vec<Filter>) -> GlobalIterator {
        GlobalIterator::matching(Arc::clone(self), filters)
    }
}
