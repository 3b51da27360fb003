//! Status - activity-based health check.
//!
//! Listens to consumer events and reports unhealthy once neither a task nor a
//! full queue pass was consumed within the tolerated delay. A stuck or dead
//! driver shows up here even though it never logs an error.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::ConsumerEvent;
use crate::ports::{Clock, EventSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Healthy(String),
    Unhealthy(String),
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Health::Healthy(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Health::Healthy(message) | Health::Unhealthy(message) => message,
        }
    }
}

pub struct ActivityHealthCheck {
    clock: Arc<dyn Clock>,
    tolerance: TimeDelta,
    last_activity: Mutex<Option<DateTime<Utc>>>,
}

impl ActivityHealthCheck {
    pub fn new(clock: Arc<dyn Clock>, tolerance: Duration) -> Self {
        Self {
            clock,
            tolerance: TimeDelta::from_std(tolerance).unwrap_or(TimeDelta::MAX),
            last_activity: Mutex::new(None),
        }
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        *self.lock()
    }

    /// Compared at whole-second granularity.
    pub fn check(&self) -> Health {
        match self.last_activity() {
            None => Health::Unhealthy("No activity".to_string()),
            Some(at) if (self.clock.now() - at).num_seconds() > self.tolerance.num_seconds() => {
                Health::Unhealthy(format!("No activity since {at}"))
            }
            Some(at) => Health::Healthy(format!("Active at {at}")),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_activity.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSink for ActivityHealthCheck {
    fn emit(&self, event: &ConsumerEvent) {
        match event {
            ConsumerEvent::QueueConsumed(_) | ConsumerEvent::TaskConsumed(_) => {
                *self.lock() = Some(self.clock.now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueueId;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    fn setup() -> (Arc<FixedClock>, ActivityHealthCheck) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let check = ActivityHealthCheck::new(clock.clone(), Duration::from_secs(300));
        (clock, check)
    }

    #[test]
    fn unhealthy_before_any_activity() {
        let (_, check) = setup();
        assert_eq!(check.check(), Health::Unhealthy("No activity".into()));
    }

    #[test]
    fn healthy_within_tolerance() {
        let (clock, check) = setup();
        check.emit(&ConsumerEvent::QueueConsumed(QueueId::new("orders").unwrap()));
        let at = clock.now();

        clock.advance(TimeDelta::seconds(300));
        let health = check.check();
        assert!(health.is_healthy());
        assert_eq!(health.message(), format!("Active at {at}"));
    }

    #[test]
    fn unhealthy_once_tolerance_is_exceeded() {
        let (clock, check) = setup();
        check.emit(&ConsumerEvent::QueueConsumed(QueueId::new("orders").unwrap()));
        let at = clock.now();

        clock.advance(TimeDelta::seconds(301));
        assert_eq!(
            check.check(),
            Health::Unhealthy(format!("No activity since {at}"))
        );
    }
}
