//! `cost-worker`: recomputes every job of a dataset and prints the result.
//!
//! ```text
//! cost-worker [CONFIG_DIR] [DATASET] [--workers N] [--batch N] [--max-jobs N]
//! ```
//!
//! Defaults to `./config/costing` and `./fixtures/sample_dataset.yaml`. Log
//! verbosity follows `RUST_LOG`.

use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use job_cost_engine::adapters::in_memory::{Dataset, InMemoryCostStore, InMemorySourceTables};
use job_cost_engine::config::ConfigLoader;
use job_cost_engine::engine::CostEngine;
use job_cost_engine::models::{JobCostAggregate, UserJobCostAggregate};
use job_cost_engine::ports::AggregateStore;
use job_cost_engine::worker::{DrainSummary, Maintenance, QueueDrainWorker, QueueHealth};

#[derive(Debug)]
struct Args {
    config_dir: String,
    dataset: String,
    workers: usize,
    batch_size: Option<usize>,
    max_jobs: Option<usize>,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = Args {
            config_dir: "./config/costing".to_string(),
            dataset: "./fixtures/sample_dataset.yaml".to_string(),
            workers: 1,
            batch_size: None,
            max_jobs: None,
        };
        let mut positional = 0;
        let mut iter = env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--workers" => args.workers = number(&arg, iter.next())?.max(1),
                "--batch" => args.batch_size = Some(number(&arg, iter.next())?),
                "--max-jobs" => args.max_jobs = Some(number(&arg, iter.next())?),
                flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
                _ => {
                    match positional {
                        0 => args.config_dir = arg,
                        1 => args.dataset = arg,
                        _ => bail!("unexpected argument {}", arg),
                    }
                    positional += 1;
                }
            }
        }
        Ok(args)
    }
}

fn number(flag: &str, value: Option<String>) -> anyhow::Result<usize> {
    let value = value.with_context(|| format!("{} needs a value", flag))?;
    value
        .parse()
        .with_context(|| format!("{} expects a number, got {}", flag, value))
}

#[derive(Serialize)]
struct Report {
    summary: DrainSummary,
    health: QueueHealth,
    jobs: Vec<JobReport>,
}

#[derive(Serialize)]
struct JobReport {
    #[serde(flatten)]
    job: JobCostAggregate,
    users: Vec<UserJobCostAggregate>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse()?;
    let config = ConfigLoader::load(&args.config_dir)
        .with_context(|| format!("loading configuration from {}", args.config_dir))?;
    let batch_size = args
        .batch_size
        .unwrap_or(config.config().queue.default_batch_size);

    let raw = fs::read_to_string(&args.dataset)
        .with_context(|| format!("reading dataset {}", args.dataset))?;
    let dataset: Dataset = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing dataset {}", args.dataset))?;
    info!(
        entries = dataset.time_entries.len(),
        wage_rates = dataset.wage_rates.len(),
        exchange_rates = dataset.exchange_rates.len(),
        "Loaded dataset"
    );

    let tables = Arc::new(InMemorySourceTables::from_dataset(dataset)?);
    let store = Arc::new(InMemoryCostStore::new(&config.config().queue));
    let engine = Arc::new(CostEngine::new(
        config,
        tables.clone(),
        tables.clone(),
        tables.clone(),
    ));
    let maintenance = Maintenance::new(engine.clone(), store.clone(), tables);

    maintenance.enqueue_all_jobs().await?;

    let mut handles = Vec::with_capacity(args.workers);
    for n in 0..args.workers {
        let worker =
            QueueDrainWorker::new(format!("cost-worker-{}", n), engine.clone(), store.clone());
        let max_jobs = args.max_jobs;
        handles.push(tokio::spawn(async move {
            worker.drain_until_empty(batch_size, max_jobs).await
        }));
    }

    let mut summary = DrainSummary::default();
    for handle in handles {
        summary.absorb(handle.await??);
    }

    let mut jobs = Vec::new();
    for job in store.all_jobs().await {
        let users = store.users_for_job(&job.job_key).await?;
        jobs.push(JobReport { job, users });
    }

    let report = Report {
        summary,
        health: maintenance.queue_health().await?,
        jobs,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
