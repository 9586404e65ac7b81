//! Getting Started - Your First Actor
//!
//! Demonstrates the complete workflow for a local actor: defining a
//! message, implementing `Actor`, spawning it under a `SystemHandle`, and
//! querying it with a request/reply round trip from a second actor.
//!
//! Run with: cargo run --example getting_started

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use vesper_rt::prelude::*;

#[derive(Debug)]
enum CounterMessage {
    Increment,
    Decrement,
    GetValue,
}

impl Message for CounterMessage {
    const KIND: &'static str = "demo.counter";
}

#[derive(Debug, thiserror::Error)]
#[error("counter actor never errors")]
struct CounterError;

struct CounterActor {
    value: i64,
}

#[async_trait]
impl Actor for CounterActor {
    type Message = CounterMessage;
    type Error = CounterError;

    async fn handle_message(&mut self, message: CounterMessage, ctx: &mut ActorContext<'_, Self>) -> Result<(), Self::Error> {
        match message {
            CounterMessage::Increment => {
                self.value += 1;
                println!("  counter incremented to {}", self.value);
            }
            CounterMessage::Decrement => {
                self.value -= 1;
                println!("  counter decremented to {}", self.value);
            }
            CounterMessage::GetValue => {
                println!("  current value: {}", self.value);
                ctx.reply(self.value);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Poll;
impl Message for Poll {
    const KIND: &'static str = "demo.poll";
}

struct Querier {
    counter: WeakHandle,
    observed: Arc<AtomicI64>,
}

#[async_trait]
impl Actor for Querier {
    type Message = Poll;
    type Error = CounterError;

    async fn handle_message(&mut self, _message: Poll, ctx: &mut ActorContext<'_, Self>) -> Result<(), Self::Error> {
        let observed = Arc::clone(&self.observed);
        let target = self.counter.clone();
        ctx.request::<CounterActor>(
            &target,
            CounterMessage::GetValue,
            Box::new(move |_actor, result, ctx| {
                if let ResponseResult::Ok(value) = result {
                    if let Ok(n) = value.downcast::<i64>() {
                        observed.store(*n, Ordering::SeqCst);
                    }
                }
                ctx.quit(ExitReason::Normal);
            }),
        );
        Ok(())
    }
}

fn main() {
    println!("=== Getting Started ===\n");

    let system = SystemHandle::start(SystemConfig::default());

    println!("1. Spawning counter actor...");
    let counter = system.spawn(CounterActor { value: 0 });
    let target = counter.downgrade();

    println!("2. Sending fire-and-forget messages...");
    system.send::<CounterActor>(&target, CounterMessage::Increment);
    system.send::<CounterActor>(&target, CounterMessage::Increment);
    system.send::<CounterActor>(&target, CounterMessage::Decrement);

    println!("3. Querying the counter through a request/reply round trip...");
    let observed = Arc::new(AtomicI64::new(i64::MIN));
    let querier = system.spawn(Querier { counter: target, observed: Arc::clone(&observed) });
    let querier_weak = querier.downgrade();
    system.send::<Querier>(&querier_weak, Poll);

    let deadline = Instant::now() + Duration::from_secs(1);
    while observed.load(Ordering::SeqCst) == i64::MIN && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    println!("   reply received: {}", observed.load(Ordering::SeqCst));

    drop(counter);
    drop(querier);
    let _ = system.shutdown(Some(Duration::from_secs(1)));
    println!("\n=== Example Complete ===");
}
