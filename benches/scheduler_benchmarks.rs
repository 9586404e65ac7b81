//! Scheduler Benchmarks
//!
//! Measures baseline performance of the work-stealing scheduler end to end,
//! through the same `SystemHandle` surface real callers use:
//! - Single actor spawn + first-message latency
//! - Batch spawn of 10 actors
//! - Sustained message throughput against one actor

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

// Layer 1: Standard library imports
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, Criterion};

// Layer 3: Internal module imports
use vesper_rt::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("unreachable in this benchmark")]
struct BenchError;

#[derive(Debug)]
struct Tick;
impl Message for Tick {
    const KIND: &'static str = "bench.tick";
}

struct Counter {
    seen: Arc<AtomicU64>,
}

#[async_trait]
impl Actor for Counter {
    type Message = Tick;
    type Error = BenchError;

    async fn handle_message(&mut self, _message: Tick, _ctx: &mut ActorContext<'_, Self>) -> Result<(), Self::Error> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn wait_until(deadline: Instant, mut done: impl FnMut() -> bool) {
    while !done() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_micros(100));
    }
}

/// Benchmark: spawn one actor and wait for it to process a single message.
fn scheduler_spawn_single_and_tick(c: &mut Criterion) {
    c.bench_function("scheduler_spawn_single_and_tick", |b| {
        b.iter(|| {
            let system = SystemHandle::start(SystemConfig::default());
            let seen = Arc::new(AtomicU64::new(0));
            let actor = system.spawn(Counter { seen: Arc::clone(&seen) });
            let target = actor.downgrade();

            system.send::<Counter>(&target, Tick);
            wait_until(Instant::now() + Duration::from_secs(1), || seen.load(Ordering::SeqCst) >= 1);

            black_box(seen.load(Ordering::SeqCst));
            drop(actor);
            let _ = system.shutdown(None);
        });
    });
}

/// Benchmark: spawn 10 actors in batch, each receiving one message.
fn scheduler_spawn_batch_small(c: &mut Criterion) {
    c.bench_function("scheduler_spawn_batch_small", |b| {
        b.iter(|| {
            let system = SystemHandle::start(SystemConfig::default());
            let seen = Arc::new(AtomicU64::new(0));
            let mut handles = Vec::with_capacity(10);
            for _ in 0..10 {
                let actor = system.spawn(Counter { seen: Arc::clone(&seen) });
                system.send::<Counter>(&actor.downgrade(), Tick);
                handles.push(actor);
            }

            wait_until(Instant::now() + Duration::from_secs(1), || seen.load(Ordering::SeqCst) >= 10);

            black_box(seen.load(Ordering::SeqCst));
            drop(handles);
            let _ = system.shutdown(None);
        });
    });
}

/// Benchmark: sustained throughput of 100 messages against one actor,
/// exercising mailbox push and worker re-scheduling under load.
fn scheduler_message_throughput(c: &mut Criterion) {
    c.bench_function("scheduler_message_throughput", |b| {
        b.iter(|| {
            let system = SystemHandle::start(SystemConfig::default());
            let seen = Arc::new(AtomicU64::new(0));
            let actor = system.spawn(Counter { seen: Arc::clone(&seen) });
            let target = actor.downgrade();

            for _ in 0..100 {
                system.send::<Counter>(&target, Tick);
            }
            wait_until(Instant::now() + Duration::from_secs(2), || seen.load(Ordering::SeqCst) >= 100);

            black_box(seen.load(Ordering::SeqCst));
            drop(actor);
            let _ = system.shutdown(None);
        });
    });
}

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(30)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(2))
        .without_plots()
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets =
        scheduler_spawn_single_and_tick,
        scheduler_spawn_batch_small,
        scheduler_message_throughput
}

criterion_main!(benches);
