use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{PageLoader, PagedIterator};
use crate::domain::{Filter, PageReference, StoreError, TasksPage};
use crate::ports::TaskQueryService;

/// Pages of every task matching a filter set, regardless of queue or status.
pub struct FilteredPages {
    service: Arc<dyn TaskQueryService>,
    filters: Vec<Filter>,
}

impl FilteredPages {
    pub fn new(service: Arc<dyn TaskQueryService>, filters: Vec<Filter>) -> Self {
        Self { service, filters }
    }
}

#[async_trait]
impl PageLoader for FilteredPages {
    async fn load_page(&self, page: Option<&PageReference>) -> Result<TasksPage, StoreError> {
        debug!(filters = self.filters.len(), page = ?page, "loading filtered page");
        self.service.retrieve_page(&self.filters, page).await
    }
}

/// Lazy iterator over a store-wide search.
pub type GlobalIterator = PagedIterator<FilteredPages>;

impl PagedIterator<FilteredPages> {
    pub fn matching(service: Arc<dyn TaskQueryService>, filters: Vec<Filter>) -> Self {
        Self::new(FilteredPages::new(service, filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTask, Payload, QueueId};
    use crate::impls::InMemoryTaskStore;
    use crate::ports::{TaskQueryServiceExt, TaskStoreService};

    async fn create(store: &InMemoryTaskStore, queue: &str, kind: &str) {
        let payload = Payload::empty().with("kind", kind);
        store
            .create(&NewTask::new(QueueId::new(queue).unwrap(), payload))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn walks_matching_tasks_across_queues() {
        let store = Arc::new(InMemoryTaskStore::new().with_page_size(1));
        create(&store, "a", "refund").await;
        create(&store, "b", "refund").await;
        create(&store, "d", "order").await;
        create(&store, "c", "refund").await;
        let service: Arc<dyn TaskQueryService> = store;

        let mut iter = service.find_matching(vec![Filter::equals("kind", "refund")]);
        let mut queues = Vec::new();
        while let Some(task) = iter.next().await.unwrap() {
            queues.push(task.queue.as_str().to_string());
        }

        assert_eq!(queues, vec!["a", "b", "c"]);
        assert!(iter.pages_loaded() >= 3);
        assert!(iter.is_exhausted());
    }

    #[tokio::test]
    async fn no_filters_yields_every_task() {
        let store = Arc::new(InMemoryTaskStore::new().with_page_size(2));
        create(&store, "a", "refund").await;
        create(&store, "b", "order").await;
        create(&store, "c", "order").await;
        let service: Arc<dyn TaskQueryService> = store;

        let tasks = GlobalIterator::matching(service, Vec::new())
            .collect_remaining()
            .await
            .unwrap();
        assert_eq!(tasks.len(), 3);
    }
}
