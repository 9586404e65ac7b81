//! Single-writer timer dispatcher: [`Clock`] and [`ClockHandle`] (spec §4.4).
//!
//! Grounded on CAF's `simple_actor_clock`/`thread_safe_actor_clock`: one
//! dedicated thread owns the ordered schedule and is the only thread that
//! ever fires an entry, so two timers can never race each other's callback.
//! Producers only ever push a new entry or flip a disposed flag; they never
//! touch the schedule itself.

// Layer 1: Standard library imports
use std::any::Any;
use std::collections::BinaryHeap;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{trace, warn};

// Layer 3: Internal module imports
use crate::control_block::WeakHandle;
use crate::error::RequestError;
use crate::id::MessageId;
use crate::mailbox::{Category, MailboxElement};

/// Ingress capacity for the command channel (spec §4.4: "bounded ring-buffer
/// ingress"). Producers block-free past this only in pathological bursts;
/// ordinary `request_response_timeout` traffic never approaches it.
const INGRESS_CAPACITY: usize = 4096;

/// Cooperative cancellation handle for a scheduled entry. Dropping this
/// without calling `dispose` leaves the timer armed.
#[derive(Clone)]
pub struct Disposable {
    disposed: Arc<AtomicBool>,
}

impl Disposable {
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

enum Command {
    Schedule(Entry),
    Shutdown,
}

struct Entry {
    at: Instant,
    period: Option<Duration>,
    seq: u64,
    disposed: Arc<AtomicBool>,
    action: Box<dyn FnMut() + Send>,
}

/// Min-heap ordering: earliest `at` first, ties broken by insertion order so
/// timers that fire at the same instant run in schedule order.
struct HeapEntry(Entry);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.at == other.0.at && self.0.seq == other.0.seq
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .0
            .at
            .cmp(&self.0.at)
            .then_with(|| other.0.seq.cmp(&self.0.seq))
    }
}

/// Owns the dispatcher thread. Dropping/`shutdown`-ing stops it.
pub struct Clock {
    pub handle: ClockHandle,
    thread: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct ClockHandle {
    sender: Sender<Command>,
    seq: Arc<AtomicU64>,
}

impl Clock {
    pub fn start() -> Self {
        let (sender, receiver) = bounded(INGRESS_CAPACITY);
        let thread = std::thread::Builder::new()
            .name("vesper-clock".to_string())
            .spawn(move || dispatcher_loop(receiver))
            .expect("failed to spawn clock dispatcher thread");
        Clock {
            handle: ClockHandle {
                sender,
                seq: Arc::new(AtomicU64::new(0)),
            },
            thread: Some(thread),
        }
    }

    pub fn shutdown(mut self) {
        let _ = self.handle.sender.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl ClockHandle {
    /// Arms a one-shot action at `at`, or (with `period` set) a periodic
    /// action re-armed relative to its *intended* fire time, not the
    /// wall-clock time it actually ran — this is what keeps a periodic
    /// timer from drifting under scheduler load (spec §4.4 "missed-tick").
    fn schedule_raw(
        &self,
        at: Instant,
        period: Option<Duration>,
        action: Box<dyn FnMut() + Send>,
    ) -> Disposable {
        let disposed = Arc::new(AtomicBool::new(false));
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            at,
            period,
            seq,
            disposed: Arc::clone(&disposed),
            action,
        };
        if self.sender.send(Command::Schedule(entry)).is_err() {
            warn!("clock dispatcher thread gone; timer dropped");
        }
        Disposable { disposed }
    }

    pub fn schedule_once(&self, delay: Duration, action: impl FnMut() + Send + 'static) -> Disposable {
        self.schedule_raw(Instant::now() + delay, None, Box::new(action))
    }

    pub fn schedule_periodic(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: impl FnMut() + Send + 'static,
    ) -> Disposable {
        self.schedule_raw(Instant::now() + initial_delay, Some(period), Box::new(action))
    }

    /// Delivers a synthetic `ResponseResult::Err(RequestError::Timeout)` to
    /// `target` at `mid.response_id()` after `duration`, unless the
    /// returned `Disposable` (kept by the caller, typically discarded by
    /// value since replies dispose implicitly by arriving first — see
    /// `ActorCell::dispatch_response`) is cancelled first.
    pub fn schedule_timeout(&self, target: WeakHandle, duration: Duration, mid: MessageId) -> Disposable {
        let response_id = mid.response_id();
        self.schedule_once(duration, move || {
            if let Some(strong) = target.upgrade() {
                let element = MailboxElement::new(
                    None,
                    response_id,
                    Box::new(crate::actor::ResponseResult::Err(RequestError::Timeout))
                        as Box<dyn Any + Send>,
                    Category::Urgent,
                );
                let _ = strong.with_cell(|cell| cell.enqueue(element));
            }
        })
    }
}

fn dispatcher_loop(receiver: Receiver<Command>) {
    let mut schedule: BinaryHeap<HeapEntry> = BinaryHeap::new();

    loop {
        let wait = match schedule.peek() {
            Some(HeapEntry(entry)) => entry.at.saturating_duration_since(Instant::now()),
            None => Duration::from_secs(3600),
        };

        match receiver.recv_timeout(wait) {
            Ok(Command::Schedule(entry)) => {
                schedule.push(HeapEntry(entry));
                continue;
            }
            Ok(Command::Shutdown) => {
                trace!("clock dispatcher shutting down with {} pending timers", schedule.len());
                return;
            }
            Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {}
        }

        fire_due(&mut schedule);
    }
}

fn fire_due(schedule: &mut BinaryHeap<HeapEntry>) {
    let now = Instant::now();
    while let Some(HeapEntry(entry)) = schedule.peek() {
        if entry.at > now {
            break;
        }
        let HeapEntry(mut entry) = schedule.pop().expect("peeked entry must pop");
        if entry.disposed.load(Ordering::Acquire) {
            continue;
        }
        (entry.action)();
        if let Some(period) = entry.period {
            if !entry.disposed.load(Ordering::Acquire) {
                let next_at = entry.at + period;
                let next_at = if next_at < now {
                    warn!("periodic timer missed its tick; resyncing to now");
                    now
                } else {
                    next_at
                };
                schedule.push(HeapEntry(Entry { at: next_at, ..entry }));
            }
        }
    }
}
