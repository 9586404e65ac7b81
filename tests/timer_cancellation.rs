//! Spec §8 scenario 3: a delayed message scheduled for t=100ms, cancelled at
//! t=50ms, must never reach the target actor's mailbox.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vesper_rt::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("unreachable in this test")]
struct NeverError;

#[derive(Debug)]
struct Recorded;
impl Message for Recorded {
    const KIND: &'static str = "timer_cancellation.recorded";
}

struct Recorder {
    seen: Arc<AtomicBool>,
}

#[async_trait]
impl Actor for Recorder {
    type Message = Recorded;
    type Error = NeverError;

    async fn handle_message(&mut self, _message: Recorded, _ctx: &mut ActorContext<'_, Self>) -> Result<(), Self::Error> {
        self.seen.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
#[allow(clippy::expect_used)]
fn cancelled_timer_never_delivers_its_message() {
    let system = SystemHandle::start(SystemConfig::default());
    let seen = Arc::new(AtomicBool::new(false));
    let recorder = system.spawn(Recorder { seen: Arc::clone(&seen) });
    let target = recorder.downgrade();

    let system_for_timer = system.clone();
    let disposable = system.clock().schedule_once(Duration::from_millis(100), move || {
        system_for_timer.send::<Recorder>(&target, Recorded);
    });

    std::thread::sleep(Duration::from_millis(50));
    disposable.dispose();

    std::thread::sleep(Duration::from_millis(200));
    assert!(!seen.load(Ordering::SeqCst), "cancelled timer must not deliver its message");

    drop(recorder);
    system.shutdown(None).expect("shutdown");
}
