//! ConsumerBuilder - assembles a consumer and the driver that runs it.
//!
//! Every required collaborator is checked in `build()`, before any polling
//! starts. All missing fields are reported at once.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;

use super::config::{ConfigError, ConsumerConfig};
use super::consumer::{Consumer, ConsumerFunction};
use super::driver::{Driver, DriverSettings};
use super::retry::ReconcilePolicy;
use super::status::ActivityHealthCheck;
use crate::domain::{QueueId, ValidationError};
use crate::ports::{
    Clock, EventSink, Notifier, SystemClock, TaskQueryService, TaskStoreService,
};

/// Construction-time failures.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing required fields: {}. Set them before calling build().", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("polling period must be greater than zero")]
    ZeroPollingPeriod,

    #[error("{0:?} is out of range for a retry delay")]
    RetryDelayOutOfRange(Duration),

    #[error(transparent)]
    InvalidQueue(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builds a `Consumer` (and optionally the `Driver` around it).
///
/// # Example
/// ```ignore
/// let mut driver = ConsumerBuilder::from_queue(QueueId::new("orders")?)
///     .with_services(store)
///     .with_retry_delay(Duration::from_secs(30))
///     .consume_with(consumer_fn(|task: Task| async move { Ok(Reply::success()) }))
///     .build()?;
/// driver.start();
/// ```
pub struct ConsumerBuilder {
    queue: Option<QueueId>,
    function: Option<Arc<dyn ConsumerFunction>>,
    query: Option<Arc<dyn TaskQueryService>>,
    store: Option<Arc<dyn TaskStoreService>>,
    retry_delay: Option<Duration>,
    reconcile: ReconcilePolicy,
    settings: DriverSettings,
    clock: Arc<dyn Clock>,
    sinks: Notifier,
    activity_tolerance: Option<Duration>,
}

impl ConsumerBuilder {
    pub fn new() -> Self {
        Self {
            queue: None,
            function: None,
            query: None,
            store: None,
            retry_delay: None,
            reconcile: ReconcilePolicy::default(),
            settings: DriverSettings::default(),
            clock: Arc::new(SystemClock),
            sinks: Notifier::default(),
            activity_tolerance: None,
        }
    }

    pub fn from_queue(queue: QueueId) -> Self {
        Self::new().with_queue(queue)
    }

    pub fn with_queue(mut self, queue: QueueId) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn consume_with(mut self, function: impl ConsumerFunction + 'static) -> Self {
        self.function = Some(Arc::new(function));
        self
    }

    pub fn with_query_service(mut self, query: Arc<dyn TaskQueryService>) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_store_service(mut self, store: Arc<dyn TaskStoreService>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use one object for both the read and the write side.
    pub fn with_services<S>(self, services: Arc<S>) -> Self
    where
        S: TaskQueryService + TaskStoreService + 'static,
    {
        let query: Arc<dyn TaskQueryService> = services.clone();
        let store: Arc<dyn TaskStoreService> = services;
        self.with_query_service(query).with_store_service(store)
    }

    pub fn with_polling_period(mut self, period: Duration) -> Self {
        self.settings.period = period;
        self
    }

    /// Reschedule retried tasks `delay` into the future instead of
    /// requeueing them.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn with_reconcile_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.reconcile = policy;
        self
    }

    pub fn with_max_start_jitter(mut self, jitter: Duration) -> Self {
        self.settings.max_start_jitter = jitter;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.settings.shutdown_grace = grace;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Add a sink; may be called several times.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Track consumer activity; see `Driver::health_check()`.
    pub fn with_activity_health_check(mut self, tolerance: Duration) -> Self {
        self.activity_tolerance = Some(tolerance);
        self
    }

    /// Apply every setting of a validated config. Services and the
    /// function still have to be provided.
    pub fn with_config(mut self, config: &ConsumerConfig) -> Result<Self, BuildError> {
        config.validate()?;
        self.queue = Some(QueueId::new(config.queue.clone())?);
        self.retry_delay = config.retry_delay();
        self.reconcile = config.reconcile_policy();
        self.settings = DriverSettings {
            period: config.polling_period(),
            max_start_jitter: config.max_start_jitter(),
            shutdown_grace: config.shutdown_grace(),
        };
        self.activity_tolerance = config.activity_tolerance();
        Ok(self)
    }

    /// Validate and assemble the driver. The driver is not started.
    pub fn build(self) -> Result<Driver, BuildError> {
        let (consumer, settings, health) = self.assemble()?;
        Ok(Driver::new(Arc::new(consumer), settings).with_health_check(health))
    }

    /// Validate and assemble only the consumer, for callers that schedule
    /// `consume()` themselves.
    pub fn build_consumer(self) -> Result<Consumer, BuildError> {
        self.assemble().map(|(consumer, _, _)| consumer)
    }

    #[allow(clippy::type_complexity)]
    fn assemble(
        self,
    ) -> Result<(Consumer, DriverSettings, Option<Arc<ActivityHealthCheck>>), BuildError> {
        let mut missing = Vec::new();
        if self.queue.is_none() {
            missing.push("queue");
        }
        if self.function.is_none() {
            missing.push("consumer function");
        }
        if self.query.is_none() {
            missing.push("query service");
        }
        if self.store.is_none() {
            missing.push("store service");
        }
        let (Some(queue), Some(function), Some(query), Some(store)) =
            (self.queue, self.function, self.query, self.store)
        else {
            return Err(BuildError::MissingFields(missing));
        };

        if self.settings.period.is_zero() {
            return Err(BuildError::ZeroPollingPeriod);
        }
        let retry_delay = self
            .retry_delay
            .map(|delay| TimeDelta::from_std(delay).map_err(|_| BuildError::RetryDelayOutOfRange(delay)))
            .transpose()?;

        let mut sinks = self.sinks;
        let health = self.activity_tolerance.map(|tolerance| {
            Arc::new(ActivityHealthCheck::new(Arc::clone(&self.clock), tolerance))
        });
        if let Some(health) = &health {
            sinks.push(health.clone());
        }

        let consumer = Consumer {
            queue,
            function,
            query,
            store,
            retry_delay,
            reconcile: self.reconcile,
            clock: self.clock,
            events: Arc::new(sinks),
        };
        Ok((consumer, self.settings, health))
    }
}

impl Default for ConsumerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::consumer::consumer_fn;
    use crate::domain::{Reply, Task};
    use crate::impls::InMemoryTaskStore;

    fn orders() -> QueueId {
        QueueId::new("orders").unwrap()
    }

    #[test]
    fn test_build_success() {
        let driver = ConsumerBuilder::from_queue(orders())
            .with_services(Arc::new(InMemoryTaskStore::new()))
            .consume_with(consumer_fn(|_task: Task| async { Ok(Reply::success()) }))
            .build();
        assert!(driver.is_ok());
    }

    #[test]
    fn test_build_reports_every_missing_field() {
        let result = ConsumerBuilder::new().build();
        assert!(matches!(
            result,
            Err(BuildError::MissingFields(missing))
                if missing == vec!["queue", "consumer function", "query service", "store service"]
        ));
    }

    #[test]
    fn test_build_missing_store_service() {
        let store = Arc::new(InMemoryTaskStore::new());
        let result = ConsumerBuilder::from_queue(orders())
            .with_query_service(store)
            .consume_with(consumer_fn(|_task: Task| async { Ok(Reply::success()) }))
            .build_consumer();
        assert!(matches!(
            result,
            Err(BuildError::MissingFields(missing)) if missing == vec!["store service"]
        ));
    }

    #[test]
    fn test_build_zero_period() {
        let result = ConsumerBuilder::from_queue(orders())
            .with_services(Arc::new(InMemoryTaskStore::new()))
            .consume_with(consumer_fn(|_task: Task| async { Ok(Reply::success()) }))
            .with_polling_period(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(BuildError::ZeroPollingPeriod)));
    }

    #[test]
    fn test_config_is_applied() {
        let mut config = ConsumerConfig::for_queue("payments");
        config.polling_period_secs = 5;
        config.retry_delay_secs = Some(30);
        config.reconcile_max_attempts = 4;
        config.activity_tolerance_secs = Some(600);

        let driver = ConsumerBuilder::new()
            .with_config(&config)
            .unwrap()
            .with_services(Arc::new(InMemoryTaskStore::new()))
            .consume_with(consumer_fn(|_task: Task| async { Ok(Reply::success()) }))
            .build()
            .unwrap();

        assert_eq!(driver.settings().period, Duration::from_secs(5));
        assert!(driver.health_check().is_some());
    }

    #[test]
    fn test_config_values_reach_the_consumer() {
        let mut config = ConsumerConfig::for_queue("payments");
        config.retry_delay_secs = Some(30);
        config.reconcile_max_attempts = 4;

        let consumer = ConsumerBuilder::new()
            .with_config(&config)
            .unwrap()
            .with_services(Arc::new(InMemoryTaskStore::new()))
            .consume_with(consumer_fn(|_task: Task| async { Ok(Reply::success()) }))
            .build_consumer()
            .unwrap();

        assert_eq!(consumer.queue().as_str(), "payments");
        assert_eq!(consumer.retry_delay(), Some(TimeDelta::seconds(30)));
        assert_eq!(consumer.reconcile_policy().max_attempts, 4);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ConsumerConfig::for_queue("");
        let result = ConsumerBuilder::new().with_config(&config);
        assert!(matches!(result, Err(BuildError::Config(ConfigError::Invalid(_)))));
    }
}
