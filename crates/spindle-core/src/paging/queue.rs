use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{PageLoader, PagedIterator};
use crate::domain::{Filter, PageReference, QueueId, StoreError, TaskStatus, TasksPage};
use crate::ports::TaskQueryService;

/// Pages of one queue restricted to a single status.
pub struct QueuePages {
    service: Arc<dyn TaskQueryService>,
    queue: QueueId,
    status: TaskStatus,
    filters: Vec<Filter>,
}

impl QueuePages {
    pub fn new(
        service: Arc<dyn TaskQueryService>,
        queue: QueueId,
        status: TaskStatus,
        filters: Vec<Filter>,
    ) -> Self {
        Self {
            service,
            queue,
            status,
            filters,
        }
    }

    pub fn queue(&self) -> &QueueId {
        &self.queue
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }
}

#[async_trait]
impl PageLoader for QueuePages {
    async fn load_page(&self, page: Option<&PageReference>) -> Result<TasksPage, StoreError> {
        debug!(queue = %self.queue, status = %self.status, page = ?page, "loading queue page");
        self.service
            .retrieve_queue_page(&self.queue, self.status, &self.filters, page)
            .await
    }
}

/// Lazy iterator over the tasks of one queue.
pub type QueueIterator = PagedIterator<QueuePages>;

impl PagedIterator<QueuePages> {
    pub fn for_queue(
        service: Arc<dyn TaskQueryService>,
        queue: QueueId,
        status: TaskStatus,
        filters: Vec<Filter>,
    ) -> Self {
        Self::new(QueuePages::new(service, queue, status, filters))
    }
}
