//! spindle CLI entry point.
//!
//! Runs a consumer against an in-memory store seeded with demo tasks, until
//! Ctrl-C or `--run-for-secs` elapses, then stops the driver and prints a
//! summary of the store.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use serde::Deserialize;
use spindle_core::app::{ConsumerBuilder, ConsumerConfig, ConsumerFunction, HandlerError};
use spindle_core::domain::{NewTask, Payload, QueueId, Reply, Task};
use spindle_core::impls::InMemoryTaskStore;
use spindle_core::ports::TaskStoreService;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "spindle")]
#[command(about = "Poll a task queue, run each ready task and reconcile the outcome")]
#[command(version)]
struct Cli {
    /// JSON config file. Flags below override its values.
    #[arg(short, long, env = "SPINDLE_CONFIG")]
    config: Option<PathBuf>,

    /// Queue to consume (required unless given by --config).
    #[arg(short, long, env = "SPINDLE_QUEUE")]
    queue: Option<String>,

    /// Seconds between polling cycles.
    #[arg(long)]
    period_secs: Option<u64>,

    /// Reschedule retried tasks this many seconds later instead of requeueing.
    #[arg(long)]
    retry_delay_secs: Option<u64>,

    /// Upper bound of the random delay before the first cycle.
    #[arg(long)]
    max_jitter_secs: Option<u64>,

    /// Number of demo tasks to create before starting.
    #[arg(long, default_value_t = 10)]
    seed: usize,

    /// Tasks per page served by the in-memory store.
    #[arg(long, default_value_t = 4)]
    page_size: usize,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    run_for_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DemoOutcome {
    #[default]
    Success,
    Fail,
    Retry,
    Error,
}

#[derive(Debug, Deserialize)]
struct DemoPayload {
    name: String,
    #[serde(default)]
    outcome: DemoOutcome,
}

/// Replies according to the task's `outcome` field. Retried tasks succeed
/// from their third attempt on.
struct DemoFunction;

#[async_trait]
impl ConsumerFunction for DemoFunction {
    async fn consume(&self, task: &Task) -> Result<Reply, HandlerError> {
        let payload: DemoPayload =
            serde_json::from_value(serde_json::Value::Object(task.payload.as_map().clone()))?;

        info!(task_id = %task.id, name = %payload.name, attempt = task.attempts, "processing");
        match payload.outcome {
            DemoOutcome::Success => Ok(Reply::success()),
            DemoOutcome::Fail => Ok(Reply::fail(format!("{} cannot be processed", payload.name))),
            DemoOutcome::Retry if task.attempts < 3 => Ok(Reply::retry("not ready yet")),
            DemoOutcome::Retry => Ok(Reply::success()),
            DemoOutcome::Error => Err(format!("intentional failure for {}", payload.name).into()),
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ConsumerConfig> {
    let mut config = match (&cli.config, &cli.queue) {
        (Some(path), _) => ConsumerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(queue)) => ConsumerConfig::for_queue(queue.clone()),
        (None, None) => anyhow::bail!("either --config or --queue is required"),
    };

    if let Some(queue) = &cli.queue {
        config.queue = queue.clone();
    }
    if let Some(secs) = cli.period_secs {
        config.polling_period_secs = secs;
    }
    if let Some(secs) = cli.retry_delay_secs {
        config.retry_delay_secs = Some(secs);
    }
    if let Some(secs) = cli.max_jitter_secs {
        config.max_start_jitter_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

async fn seed_tasks(store: &InMemoryTaskStore, queue: &QueueId, count: usize) -> anyhow::Result<()> {
    const OUTCOMES: [&str; 5] = ["success", "success", "retry", "fail", "error"];
    for i in 0..count {
        let payload = Payload::empty()
            .with("name", format!("task-{i}"))
            .with("outcome", OUTCOMES[i % OUTCOMES.len()]);
        store.create(&NewTask::new(queue.clone(), payload)).await?;
    }
    info!(queue = %queue, count, "seeded demo tasks");
    Ok(())
}

async fn wait_for_stop(run_for: Option<Duration>) {
    match run_for {
        Some(duration) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupted"),
                _ = tokio::time::sleep(duration) => info!(?duration, "run time elapsed"),
            }
        }
        None => {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for Ctrl-C; stopping");
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --log-level CLI arg > default "info"
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone());
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    let config = load_config(&cli)?;
    info!(?config, "configuration loaded");

    let store = Arc::new(InMemoryTaskStore::new().with_page_size(cli.page_size));
    let queue = QueueId::new(config.queue.clone())?;
    seed_tasks(&store, &queue, cli.seed).await?;

    let mut driver = ConsumerBuilder::new()
        .with_config(&config)?
        .with_services(store.clone())
        .consume_with(DemoFunction)
        .build()?;

    driver.start();
    wait_for_stop(cli.run_for_secs.map(Duration::from_secs)).await;
    let outcome = driver.stop().await;

    let stats = driver.stats();
    info!(
        ?outcome,
        cycles_succeeded = stats.succeeded,
        cycles_failed = stats.failed,
        "driver finished"
    );

    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    for task in store.tasks().await {
        *by_status.entry(task.status.as_str()).or_default() += 1;
    }
    for (status, count) in &by_status {
        info!(status, count, "tasks");
    }
    if let Some(health) = driver.health_check() {
        let health = health.check();
        info!(healthy = health.is_healthy(), message = health.message(), "activity");
    }

    Ok(())
}
