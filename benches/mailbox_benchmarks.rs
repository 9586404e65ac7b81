//! Mailbox Benchmarks
//!
//! Measures baseline performance of the multi-queue actor inbox:
//! - Single-category push/pop round trip
//! - Sustained throughput across all four DRR categories
//! - Push contention from multiple producer threads

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

// Layer 1: Standard library imports
use std::hint::black_box;
use std::time::Duration;

// Layer 2: Third-party crate imports
use criterion::{criterion_group, criterion_main, Criterion};

// Layer 3: Internal module imports
use vesper_rt::id::MessageId;
use vesper_rt::mailbox::{Category, Mailbox, MailboxElement, PopResult};

fn elem(category: Category) -> MailboxElement {
    MailboxElement::new(None, MessageId::none(), Box::new(0u64), category)
}

/// Benchmark: push then immediately pop 100 `Normal` elements.
fn mailbox_push_pop_single_category(c: &mut Criterion) {
    c.bench_function("mailbox_push_pop_single_category", |b| {
        b.iter(|| {
            let (mailbox, mut consumer) = Mailbox::new();
            for _ in 0..100 {
                mailbox.push(elem(Category::Normal));
            }
            let mut drained = 0;
            while let PopResult::Some(e) = consumer.pop() {
                black_box(e);
                drained += 1;
            }
            black_box(drained);
        });
    });
}

/// Benchmark: push 100 elements spread across all four categories, then
/// drain them through the DRR consumer.
fn mailbox_push_pop_mixed_categories(c: &mut Criterion) {
    let categories = [Category::Urgent, Category::Normal, Category::Upstream, Category::Downstream];

    c.bench_function("mailbox_push_pop_mixed_categories", |b| {
        b.iter(|| {
            let (mailbox, mut consumer) = Mailbox::new();
            for i in 0..100 {
                mailbox.push(elem(categories[i % categories.len()]));
            }
            let mut drained = 0;
            while let PopResult::Some(e) = consumer.pop() {
                black_box(e);
                drained += 1;
            }
            black_box(drained);
        });
    });
}

/// Benchmark: four producer threads racing to push into one mailbox while
/// a single consumer drains it, exercising the same contention pattern a
/// busy actor sees under fan-in.
fn mailbox_concurrent_producers(c: &mut Criterion) {
    c.bench_function("mailbox_concurrent_producers", |b| {
        b.iter(|| {
            let (mailbox, mut consumer) = Mailbox::new();
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    let mailbox = mailbox.clone();
                    scope.spawn(move || {
                        for _ in 0..25 {
                            mailbox.push(elem(Category::Normal));
                        }
                    });
                }
            });
            let mut drained = 0;
            loop {
                match consumer.pop() {
                    PopResult::Some(e) => {
                        black_box(e);
                        drained += 1;
                    }
                    PopResult::Blocked | PopResult::Retry => break,
                }
            }
            black_box(drained);
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
        mailbox_push_pop_single_category,
        mailbox_push_pop_mixed_categories,
        mailbox_concurrent_producers
}

criterion_main!(benches);
