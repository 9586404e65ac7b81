//! Basic Monitoring
//!
//! Demonstrates the `Monitor<E>` trait with `InMemoryMonitor`: recording
//! actor lifecycle events, filtering by severity, and taking snapshots.
//!
//! Run with: cargo run --example monitoring_basic

use std::collections::HashMap;

use chrono::Utc;

use vesper_rt::id::ActorId;
use vesper_rt::monitoring::{ActorEvent, ActorEventKind, EventSeverity, InMemoryMonitor, Monitor, MonitoringConfig};
use vesper_rt::registry::Registry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Basic Monitoring ===\n");

    basic_monitoring_setup().await?;
    severity_filtering_example().await?;
    snapshot_and_reset_example().await?;

    println!("\n=== Example Complete ===");
    Ok(())
}

/// A source of real `ActorId`s for the demo, so the events below describe
/// actors that could plausibly exist rather than arbitrary numbers.
fn registry() -> Registry {
    Registry::new()
}

async fn basic_monitoring_setup() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Example 1: Basic setup ---");

    let registry = registry();
    let config = MonitoringConfig::default();
    let monitor = InMemoryMonitor::new(config);

    for _ in 1..=5 {
        let actor_id = registry.next_actor_id();
        let event = ActorEvent {
            timestamp: Utc::now(),
            actor_id,
            event_kind: ActorEventKind::Spawned,
            metadata: HashMap::new(),
        };
        monitor.record(event).await?;
    }

    let snapshot = monitor.snapshot().await?;
    println!("  total events recorded: {}", snapshot.total_events);
    println!("  debug-level events: {}\n", snapshot.debug_count);
    Ok(())
}

async fn severity_filtering_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Example 2: Severity filtering ---");

    let registry = registry();
    let config = MonitoringConfig { severity_filter: EventSeverity::Warning, ..MonitoringConfig::default() };
    let monitor = InMemoryMonitor::new(config);

    let spawned = ActorEvent {
        timestamp: Utc::now(),
        actor_id: registry.next_actor_id(),
        event_kind: ActorEventKind::Spawned, // Debug severity, filtered out
        metadata: HashMap::new(),
    };
    let errored = ActorEvent {
        timestamp: Utc::now(),
        actor_id: registry.next_actor_id(),
        event_kind: ActorEventKind::ErrorOccurred { error: "mailbox bounced".to_string() }, // Error severity, recorded
        metadata: HashMap::new(),
    };

    monitor.record(spawned).await?;
    monitor.record(errored).await?;

    let snapshot = monitor.snapshot().await?;
    println!("  events recorded with Warning+ filter: {}", snapshot.total_events);
    println!("  debug events (filtered out): {}", snapshot.debug_count);
    println!("  error events (recorded): {}\n", snapshot.error_count);
    Ok(())
}

async fn snapshot_and_reset_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Example 3: Snapshot and reset ---");

    let registry = registry();
    let config = MonitoringConfig { max_history_size: 10, ..MonitoringConfig::default() };
    let monitor = InMemoryMonitor::new(config);

    for i in 1..=15 {
        let event = ActorEvent {
            timestamp: Utc::now(),
            actor_id: registry.next_actor_id(),
            event_kind: ActorEventKind::MessageProcessed { message_type: "demo.ping".to_string(), duration_micros: i * 10 },
            metadata: HashMap::new(),
        };
        monitor.record(event).await?;
    }

    let before = monitor.snapshot().await?;
    println!("  before reset: total={}, history={}", before.total_events, before.recent_events.len());

    monitor.reset().await?;

    let after = monitor.snapshot().await?;
    println!("  after reset: total={}, history={}\n", after.total_events, after.recent_events.len());
    Ok(())
}
