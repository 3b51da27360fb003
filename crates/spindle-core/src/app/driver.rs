//! Driver - runs a consume cycle on a fixed rate until stopped.
//!
//! - The first cycle starts after a random delay in `[0, max_start_jitter]`
//!   so that processes polling the same queue drift apart.
//! - Later cycles are scheduled from the previous *scheduled* time. A cycle
//!   that overruns delays the next one; cycles never overlap.
//! - A failing or panicking cycle is logged and the schedule carries on.
//! - `stop()` blocks further cycles, gives an in-flight one `shutdown_grace`
//!   to finish and cancels it after that.
//!
//! There is no process-exit hook: the embedding process calls `stop()`.
//! Dropping a running `Driver` closes its shutdown channel, which also ends
//! the loop once any in-flight cycle returns.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::consumer::{ConsumeError, Consumer, panic_message};
use super::status::ActivityHealthCheck;

/// One unit of scheduled work.
#[async_trait]
pub trait PollCycle: Send + Sync {
    /// Name used in log records.
    fn label(&self) -> &str;

    async fn run_cycle(&self) -> Result<(), ConsumeError>;
}

#[async_trait]
impl PollCycle for Consumer {
    fn label(&self) -> &str {
        self.queue().as_str()
    }

    async fn run_cycle(&self) -> Result<(), ConsumeError> {
        self.consume().await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    pub period: Duration,
    pub max_start_jitter: Duration,
    pub shutdown_grace: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            max_start_jitter: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(120),
        }
    }
}

/// How `stop()` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The loop finished within the grace period.
    Drained,
    /// The grace period ran out and the in-flight cycle was cancelled.
    Forced,
    NotRunning,
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Cycle counters since the driver was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub succeeded: u64,
    pub failed: u64,
}

impl DriverStats {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }
}

struct Running {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

pub struct Driver {
    cycle: Arc<dyn PollCycle>,
    settings: DriverSettings,
    counters: Arc<Counters>,
    health: Option<Arc<ActivityHealthCheck>>,
    running: Option<Running>,
}

impl Driver {
    pub fn new(cycle: Arc<dyn PollCycle>, settings: DriverSettings) -> Self {
        Self {
            cycle,
            settings,
            counters: Arc::new(Counters::default()),
            health: None,
            running: None,
        }
    }

    pub(crate) fn with_health_check(mut self, health: Option<Arc<ActivityHealthCheck>>) -> Self {
        self.health = health;
        self
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// The activity health check wired by the builder, if one was requested.
    pub fn health_check(&self) -> Option<Arc<ActivityHealthCheck>> {
        self.health.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.join.is_finished())
    }

    pub fn stats(&self) -> DriverStats {
        DriverStats {
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Spawn the polling loop on the current tokio runtime.
    ///
    /// Returns `false` if the driver is already running.
    pub fn start(&mut self) -> bool {
        if self.running.is_some() {
            return false;
        }

        let initial_delay = start_jitter(self.settings.max_start_jitter);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cycle = Arc::clone(&self.cycle);
        let counters = Arc::clone(&self.counters);
        let settings = self.settings;

        info!(
            cycle = cycle.label(),
            period = ?settings.period,
            initial_delay = ?initial_delay,
            "starting driver"
        );
        let join = tokio::spawn(async move {
            run_loop(cycle, settings, initial_delay, counters, shutdown_rx).await;
        });

        self.running = Some(Running { shutdown_tx, join });
        true
    }

    /// Stop scheduling and wait up to `shutdown_grace` for an in-flight
    /// cycle.
    pub async fn stop(&mut self) -> ShutdownOutcome {
        let Some(Running {
            shutdown_tx,
            mut join,
        }) = self.running.take()
        else {
            return ShutdownOutcome::NotRunning;
        };

        // receiver may already be gone if the loop ended
        let _ = shutdown_tx.send(true);

        let grace = self.settings.shutdown_grace;
        match tokio::time::timeout(grace, &mut join).await {
            Ok(_) => {
                info!(cycle = self.cycle.label(), "driver stopped");
                ShutdownOutcome::Drained
            }
            Err(_) => {
                warn!(
                    cycle = self.cycle.label(),
                    grace = ?grace,
                    "in-flight cycle outlived the shutdown grace period; cancelling"
                );
                join.abort();
                let _ = join.await;
                ShutdownOutcome::Forced
            }
        }
    }
}

/// Uniformly random delay in `[0, max]`, at millisecond resolution.
pub fn start_jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

async fn run_loop(
    cycle: Arc<dyn PollCycle>,
    settings: DriverSettings,
    initial_delay: Duration,
    counters: Arc<Counters>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let period = settings.period.max(Duration::from_millis(1));
    let mut ticks = tokio::time::interval_at(Instant::now() + initial_delay, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            biased;
            // a send or a dropped sender both end the loop
            _ = shutdown_rx.changed() => break,
            _ = ticks.tick() => {}
        }
        if *shutdown_rx.borrow() {
            break;
        }

        run_isolated(cycle.as_ref(), &counters).await;
    }

    debug!(cycle = cycle.label(), "polling loop exited");
}

async fn run_isolated(cycle: &dyn PollCycle, counters: &Counters) {
    let result = AssertUnwindSafe(cycle.run_cycle()).catch_unwind().await;
    match result {
        Ok(Ok(())) => {
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(err)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            let cause = std::error::Error::source(&err)
                .map(|source| source.to_string())
                .unwrap_or_default();
            error!(
                cycle = cycle.label(),
                error = %err,
                cause = %cause,
                "consume cycle failed; next cycle stays scheduled"
            );
        }
        Err(panic) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                cycle = cycle.label(),
                panic = %panic_message(panic.as_ref()),
                "consume cycle panicked; next cycle stays scheduled"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StoreError, TaskId};
    use std::sync::atomic::AtomicUsize;

    /// Counts runs; optionally sleeps, fails or panics.
    #[derive(Default)]
    struct ScriptedCycle {
        runs: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        duration: Duration,
        fail: bool,
        panic: bool,
    }

    impl ScriptedCycle {
        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PollCycle for ScriptedCycle {
        fn label(&self) -> &str {
            "scripted"
        }

        async fn run_cycle(&self) -> Result<(), ConsumeError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.duration.is_zero() {
                tokio::time::sleep(self.duration).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panic {
                panic!("cycle blew up");
            }
            if self.fail {
                return Err(ConsumeError::ReconcileExhausted {
                    task_id: TaskId::new("t-1").unwrap(),
                    attempts: 2,
                    source: StoreError::Remote("timeout".into()),
                });
            }
            Ok(())
        }
    }

    fn settings(period_secs: u64, grace_secs: u64) -> DriverSettings {
        DriverSettings {
            period: Duration::from_secs(period_secs),
            max_start_jitter: Duration::ZERO,
            shutdown_grace: Duration::from_secs(grace_secs),
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        assert_eq!(start_jitter(Duration::ZERO), Duration::ZERO);
        for _ in 0..1_000 {
            assert!(start_jitter(Duration::from_secs(60)) <= Duration::from_secs(60));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_at_a_fixed_rate() {
        let cycle = Arc::new(ScriptedCycle::default());
        let mut driver = Driver::new(cycle.clone(), settings(10, 120));

        assert!(driver.start());
        tokio::time::sleep(Duration::from_secs(35)).await;

        // t = 0, 10, 20, 30
        assert_eq!(cycle.runs(), 4);
        assert_eq!(driver.stop().await, ShutdownOutcome::Drained);
        assert_eq!(driver.stats().succeeded, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn first_cycle_waits_for_the_initial_delay() {
        let cycle = Arc::new(ScriptedCycle::default());
        let counters = Arc::new(Counters::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(run_loop(
            cycle.clone(),
            settings(10, 1),
            Duration::from_secs(30),
            Arc::clone(&counters),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(cycle.runs(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cycle.runs(), 1);

        // next tick is 10s after the delayed first one
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(cycle.runs(), 2);

        shutdown_tx.send(true).unwrap();
        join.await.unwrap();
        assert_eq!(counters.succeeded.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_cycles_do_not_cancel_the_schedule() {
        let cycle = Arc::new(ScriptedCycle {
            fail: true,
            ..ScriptedCycle::default()
        });
        let mut driver = Driver::new(cycle.clone(), settings(10, 120));

        driver.start();
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(cycle.runs(), 3);
        assert_eq!(driver.stats(), DriverStats { succeeded: 0, failed: 3 });
        assert!(driver.is_running());
        driver.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_cycles_do_not_cancel_the_schedule() {
        let cycle = Arc::new(ScriptedCycle {
            panic: true,
            ..ScriptedCycle::default()
        });
        let mut driver = Driver::new(cycle.clone(), settings(10, 120));

        driver.start();
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(cycle.runs(), 3);
        assert_eq!(driver.stats().failed, 3);
        driver.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycles_never_overlap() {
        let cycle = Arc::new(ScriptedCycle {
            duration: Duration::from_secs(25),
            ..ScriptedCycle::default()
        });
        let mut driver = Driver::new(cycle.clone(), settings(10, 120));

        driver.start();
        tokio::time::sleep(Duration::from_secs(100)).await;

        assert!(cycle.runs() >= 3);
        assert_eq!(cycle.max_in_flight.load(Ordering::SeqCst), 1);
        driver.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_lets_the_in_flight_cycle_finish() {
        let cycle = Arc::new(ScriptedCycle {
            duration: Duration::from_secs(5),
            ..ScriptedCycle::default()
        });
        let mut driver = Driver::new(cycle.clone(), settings(60, 120));

        driver.start();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(driver.stop().await, ShutdownOutcome::Drained);
        assert_eq!(driver.stats().succeeded, 1);
        assert!(!driver.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_a_cycle_that_outlives_the_grace_period() {
        let cycle = Arc::new(ScriptedCycle {
            duration: Duration::from_secs(1_000),
            ..ScriptedCycle::default()
        });
        let mut driver = Driver::new(cycle.clone(), settings(60, 2));

        driver.start();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(driver.stop().await, ShutdownOutcome::Forced);
        assert_eq!(driver.stats().total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_cycle_starts_after_stop() {
        let cycle = Arc::new(ScriptedCycle::default());
        let mut driver = Driver::new(cycle.clone(), settings(10, 120));

        driver.start();
        tokio::time::sleep(Duration::from_secs(5)).await;
        driver.stop().await;
        let runs = cycle.runs();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(cycle.runs(), runs);
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_are_idempotent() {
        let cycle = Arc::new(ScriptedCycle::default());
        let mut driver = Driver::new(cycle, settings(10, 120));

        assert_eq!(driver.stop().await, ShutdownOutcome::NotRunning);
        assert!(driver.start());
        assert!(!driver.start());
        assert_eq!(driver.stop().await, ShutdownOutcome::Drained);
        assert_eq!(driver.stop().await, ShutdownOutcome::NotRunning);
    }
}
