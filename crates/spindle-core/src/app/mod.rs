//! App - application layer
//!
//! Combines the ports into the consumer engine.
//!
//! # Components
//! - **Consumer**: one pass over a queue (claim → execute → reconcile)
//! - **Driver**: fixed-rate scheduling, failure isolation, graceful stop
//! - **ConsumerBuilder**: wiring and fail-fast validation
//! - **ConsumerConfig**: JSON-loadable settings
//! - **ActivityHealthCheck**: liveness derived from consumer events

pub mod builder;
pub mod config;
pub mod consumer;
pub mod driver;
pub mod retry;
pub mod status;

pub use self::builder::{BuildError, ConsumerBuilder};
pub use self::config::{ConfigError, ConsumerConfig};
pub use self::consumer::{
    ConsumeError, Consumer, ConsumerFunction, CycleReport, FnConsumer, HandlerError,
    ReconcileOutcome, consumer_fn,
};
pub use self::driver::{Driver, DriverSettings, DriverStats, PollCycle, ShutdownOutcome, start_jitter};
pub use self::retry::{ReconcilePolicy, RetryExhausted, retry_fixed};
pub use self::status::{ActivityHealthCheck, Health};
