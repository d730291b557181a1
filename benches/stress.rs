use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use ulid::Ulid;

use venued::engine::{Engine, EngineError};

fn bench_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("venued_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

async fn make_venues(engine: &Engine, n: usize) -> Vec<Ulid> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let venue = engine
            .create_venue(
                format!("Venue {i}"),
                "Bench City".into(),
                100,
                75.0,
                "bench@example.com".into(),
            )
            .await
            .unwrap();
        ids.push(venue.id);
    }
    println!("  created {n} venues");
    ids
}

async fn phase1_sequential(engine: &Engine, venue_id: Ulid) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let date = base_date() + Days::new(i as u64);
        let t = Instant::now();
        engine
            .create_booking(
                venue_id,
                format!("Guest {i}"),
                "guest@example.com".into(),
                date,
                2,
            )
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_concurrent(engine: &Arc<Engine>, venues: &[Ulid]) {
    let n_tasks = 10;
    let n_per_task = 200usize;

    let start = Instant::now();
    let mut handles = Vec::new();

    for (i, &venue_id) in venues.iter().enumerate().take(n_tasks) {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(n_per_task);
            // Past the range phase 1 consumed on its venue
            for j in 0..n_per_task {
                let date = base_date() + Days::new(3000 + j as u64);
                let t = Instant::now();
                engine
                    .create_booking(
                        venue_id,
                        format!("Task {i} guest {j}"),
                        "guest@example.com".into(),
                        date,
                        1,
                    )
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in handles {
        all.extend(h.await.unwrap());
    }
    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {total} bookings across {n_tasks} tasks in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
    print_latency("write latency", &mut all);
}

async fn phase3_conflict_storm(engine: &Arc<Engine>, venue_id: Ulid) {
    let n_tasks = 64;
    let date = base_date() + Days::new(10_000);

    let start = Instant::now();
    let mut handles = Vec::new();
    for i in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_booking(
                    venue_id,
                    format!("Contender {i}"),
                    "guest@example.com".into(),
                    date,
                    1,
                )
                .await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => wins += 1,
            Err(EngineError::DoubleBooking { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    let elapsed = start.elapsed();
    assert_eq!(wins, 1, "exactly one contender must win the slot");
    println!(
        "  {n_tasks} contenders for one slot in {:.2}ms: 1 won, {conflicts} rejected",
        elapsed.as_secs_f64() * 1000.0
    );
}

#[tokio::main]
async fn main() {
    let engine = Arc::new(Engine::new(bench_wal_path("stress.wal")).unwrap());

    println!("setup:");
    let venues = make_venues(&engine, 10).await;

    println!("phase 1: sequential bookings, one venue");
    phase1_sequential(&engine, venues[0]).await;

    println!("phase 2: concurrent bookings, ten venues");
    phase2_concurrent(&engine, &venues).await;

    println!("phase 3: conflict storm, one slot");
    phase3_conflict_storm(&engine, venues[1]).await;

    println!("phase 4: WAL compaction");
    let before = engine.wal_appends_since_compact().await;
    let t = Instant::now();
    engine.compact_wal().await.unwrap();
    println!(
        "  compacted {before} appends in {:.2}ms",
        t.elapsed().as_secs_f64() * 1000.0
    );
}
