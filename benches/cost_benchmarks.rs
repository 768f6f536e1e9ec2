//! Performance benchmarks for the job cost engine.
//!
//! Covers the pure calculation, a single engine recompute against the
//! in-memory tables, and draining a full queue:
//! - Job with 10 entries: < 100μs mean
//! - Job with 500 timer entries: < 5ms mean
//! - Drain of 100 dirty jobs: < 50ms mean
//!
//! Run with: `cargo bench`
//! HTML reports are generated in `target/criterion/`

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;

use job_cost_engine::adapters::in_memory::{Dataset, InMemoryCostStore, InMemorySourceTables};
use job_cost_engine::calculation::{
    calculate_job_cost, BusinessCalendar, CostRules, ExchangeRateResolver, SystemWage,
    WageRateResolver,
};
use job_cost_engine::config::{ConfigLoader, CostConfig};
use job_cost_engine::engine::CostEngine;
use job_cost_engine::models::{Bucket, EntryKind, ExchangeRate, PayBasis, TimeEntry, WageRate};
use job_cost_engine::ports::RecalcQueue;
use job_cost_engine::worker::QueueDrainWorker;

const EMPLOYEES: usize = 20;

fn decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn load_config() -> ConfigLoader {
    ConfigLoader::load("./config/costing").expect("Failed to load config")
}

/// Half the employees are paid monthly in TRY, half hourly in EUR.
fn wage_rates() -> Vec<WageRate> {
    (0..EMPLOYEES)
        .map(|i| {
            let (amount, basis, currency) = if i % 2 == 0 {
                ("45000", PayBasis::Monthly, "TRY")
            } else {
                ("30", PayBasis::Hourly, "EUR")
            };
            WageRate {
                employee_id: format!("emp_{:02}", i),
                amount: decimal(amount),
                basis,
                currency: currency.to_string(),
                effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                effective_to: None,
                after_hours_multiplier: None,
                holiday_multiplier: None,
            }
        })
        .collect()
}

/// One TRY->EUR rate per day of 2025.
fn exchange_rates() -> Vec<ExchangeRate> {
    let first = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    (0..365)
        .map(|day| ExchangeRate {
            from: "TRY".to_string(),
            to: "EUR".to_string(),
            date: first + Duration::days(day),
            rate: Decimal::new(250 + day % 7, 4),
        })
        .collect()
}

/// Timer entries of about nine hours each, spread over the year.
fn timer_entries(job_key: &str, count: usize) -> Vec<TimeEntry> {
    let first = Utc.with_ymd_and_hms(2025, 1, 2, 5, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let start = first + Duration::hours(i as i64 * 17);
            TimeEntry {
                id: format!("{}_te_{}", job_key, i),
                employee_id: format!("emp_{:02}", i % EMPLOYEES),
                job_key: job_key.to_string(),
                kind: EntryKind::Timer {
                    start,
                    finish: Some(start + Duration::minutes(545)),
                },
                void: false,
            }
        })
        .collect()
}

fn manual_entries(job_key: &str, count: usize) -> Vec<TimeEntry> {
    (0..count)
        .map(|i| TimeEntry {
            id: format!("{}_te_{}", job_key, i),
            employee_id: format!("emp_{:02}", i % EMPLOYEES),
            job_key: job_key.to_string(),
            kind: EntryKind::Manual {
                date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
                hours: decimal("7.5"),
                bucket: if i % 4 == 0 {
                    Bucket::AfterHours
                } else {
                    Bucket::Regular
                },
            },
            void: false,
        })
        .collect()
}

/// Benchmark: pure calculation at several entry counts.
fn bench_calculation(c: &mut Criterion) {
    let config = load_config();
    let costing = &config.config().costing;
    let wages = WageRateResolver::new(
        wage_rates(),
        SystemWage::from_config(&costing.wage_fallback, None),
        costing.wage_month_hours,
    );
    let exchange = ExchangeRateResolver::new(exchange_rates());
    let calendar = BusinessCalendar::from_config(&config.config().calendar);
    let rules = CostRules {
        wages: &wages,
        exchange: &exchange,
        calendar: &calendar,
        multipliers: &config.config().buckets,
        reporting_currency: &costing.reporting_currency,
    };

    let mut group = c.benchmark_group("calculation");

    let manual = manual_entries("J-M", 10);
    group.throughput(Throughput::Elements(10));
    group.bench_function("manual_10", |b| {
        b.iter(|| black_box(calculate_job_cost("J-M", black_box(&manual), &rules)))
    });

    for count in [10usize, 100, 500].iter() {
        let entries = timer_entries("J-T", *count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("timers", count), &entries, |b, entries| {
            b.iter(|| black_box(calculate_job_cost("J-T", black_box(entries), &rules)))
        });
    }

    group.finish();
}

/// Benchmark: one engine recompute, including the source reads.
fn bench_engine_compute(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let tables = Arc::new(
        InMemorySourceTables::from_dataset(Dataset {
            time_entries: timer_entries("J-1", 100),
            wage_rates: wage_rates(),
            exchange_rates: exchange_rates(),
        })
        .unwrap(),
    );
    let engine = CostEngine::new(load_config(), tables.clone(), tables.clone(), tables);

    c.bench_function("engine_compute_100_timers", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.compute("J-1").await.unwrap()) })
    });
}

/// Benchmark: draining 100 dirty jobs with one worker.
fn bench_drain(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let job_keys: Vec<String> = (0..100).map(|i| format!("J-{:03}", i)).collect();
    let tables = Arc::new(
        InMemorySourceTables::from_dataset(Dataset {
            time_entries: job_keys
                .iter()
                .flat_map(|job_key| manual_entries(job_key, 5))
                .collect(),
            wage_rates: wage_rates(),
            exchange_rates: exchange_rates(),
        })
        .unwrap(),
    );
    let mut config = CostConfig::default();
    config.queue.retry_backoff_secs = 0;
    let config = ConfigLoader::from_config(config).unwrap();
    let store = Arc::new(InMemoryCostStore::new(&config.config().queue));
    let engine = Arc::new(CostEngine::new(
        config,
        tables.clone(),
        tables.clone(),
        tables,
    ));
    let worker = QueueDrainWorker::new("bench", engine, store.clone());

    let mut group = c.benchmark_group("drain");
    group.throughput(Throughput::Elements(100));
    group.sample_size(20);

    group.bench_function("drain_100_jobs", |b| {
        b.to_async(&rt).iter(|| async {
            for job_key in &job_keys {
                store.enqueue(job_key).await.unwrap();
            }
            black_box(worker.drain_until_empty(25, None).await.unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_calculation, bench_engine_compute, bench_drain);
criterion_main!(benches);
