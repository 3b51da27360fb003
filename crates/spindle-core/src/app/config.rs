//! Consumer configuration, loadable from JSON.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::retry::ReconcilePolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything needed to assemble a consumer and its driver.
///
/// Only `queue` is required; every other field has a default.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Queue to consume.
    pub queue: String,

    /// Seconds between two polling cycles.
    ///
    /// - Default: 60
    #[serde(default = "default_polling_period_secs")]
    pub polling_period_secs: u64,

    /// When set, retried tasks are rescheduled this many seconds into the
    /// future instead of being requeued immediately.
    #[serde(default)]
    pub retry_delay_secs: Option<u64>,

    /// Attempts at writing a reply back before the cycle fails.
    ///
    /// - Default: 2
    #[serde(default = "default_reconcile_max_attempts")]
    pub reconcile_max_attempts: u32,

    /// Seconds between two reconcile attempts.
    ///
    /// - Default: 10
    #[serde(default = "default_reconcile_backoff_secs")]
    pub reconcile_backoff_secs: u64,

    /// Upper bound of the random delay before the first cycle.
    ///
    /// - Default: 60
    #[serde(default = "default_max_start_jitter_secs")]
    pub max_start_jitter_secs: u64,

    /// How long `stop()` waits for an in-flight cycle before cancelling it.
    ///
    /// - Default: 120
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Enables the activity health check: unhealthy once no task or queue
    /// was consumed for this many seconds.
    #[serde(default)]
    pub activity_tolerance_secs: Option<u64>,

    /// Task server endpoint and credentials, for HTTP service
    /// implementations. Not read by the consumer itself.
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_polling_period_secs() -> u64 {
    60
}

fn default_reconcile_max_attempts() -> u32 {
    2
}

fn default_reconcile_backoff_secs() -> u64 {
    10
}

fn default_max_start_jitter_secs() -> u64 {
    60
}

fn default_shutdown_grace_secs() -> u64 {
    120
}

impl ConsumerConfig {
    pub fn for_queue(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            polling_period_secs: default_polling_period_secs(),
            retry_delay_secs: None,
            reconcile_max_attempts: default_reconcile_max_attempts(),
            reconcile_backoff_secs: default_reconcile_backoff_secs(),
            max_start_jitter_secs: default_max_start_jitter_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            activity_tolerance_secs: None,
            server_url: None,
            username: None,
            password: None,
        }
    }

    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.trim().is_empty() {
            return Err(ConfigError::Invalid("queue must not be blank".into()));
        }
        if self.polling_period_secs == 0 {
            return Err(ConfigError::Invalid(
                "polling_period_secs must be greater than zero".into(),
            ));
        }
        if self.reconcile_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconcile_max_attempts must be at least 1".into(),
            ));
        }
        if self.activity_tolerance_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "activity_tolerance_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn polling_period(&self) -> Duration {
        Duration::from_secs(self.polling_period_secs)
    }

    pub fn retry_delay(&self) -> Option<Duration> {
        self.retry_delay_secs.map(Duration::from_secs)
    }

    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy::new(
            self.reconcile_max_attempts,
            Duration::from_secs(self.reconcile_backoff_secs),
        )
    }

    pub fn max_start_jitter(&self) -> Duration {
        Duration::from_secs(self.max_start_jitter_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn activity_tolerance(&self) -> Option<Duration> {
        self.activity_tolerance_secs.map(Duration::from_secs)
    }
}

impl fmt::Debug for ConsumerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerConfig")
            .field("queue", &self.queue)
            .field("polling_period_secs", &self.polling_period_secs)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("reconcile_max_attempts", &self.reconcile_max_attempts)
            .field("reconcile_backoff_secs", &self.reconcile_backoff_secs)
            .field("max_start_jitter_secs", &self.max_start_jitter_secs)
            .field("shutdown_grace_secs", &self.shutdown_grace_secs)
            .field("activity_tolerance_secs", &self.activity_tolerance_secs)
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
