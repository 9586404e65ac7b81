//! Spec §8 scenario 1: spawn a `pong` actor that replies to `ping(n)` with
//! `pong(n)`, spawn a `ping` actor that sends one request and quits on the
//! reply. Both actors terminate normally and the registry returns to its
//! baseline once they're gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use vesper_rt::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("unreachable in this test")]
struct NeverError;

#[derive(Debug)]
struct PingReq(u64);
impl Message for PingReq {
    const KIND: &'static str = "ping_pong.ping";
}

#[derive(Debug)]
struct Go;
impl Message for Go {
    const KIND: &'static str = "ping_pong.go";
}

struct Pong;

#[async_trait]
impl Actor for Pong {
    type Message = PingReq;
    type Error = NeverError;

    async fn handle_message(&mut self, message: PingReq, ctx: &mut ActorContext<'_, Self>) -> Result<(), Self::Error> {
        ctx.reply(message.0);
        ctx.quit(ExitReason::Normal);
        Ok(())
    }
}

struct Ping {
    pong: WeakHandle,
    matched: Arc<AtomicBool>,
}

#[async_trait]
impl Actor for Ping {
    type Message = Go;
    type Error = NeverError;

    async fn handle_message(&mut self, _message: Go, ctx: &mut ActorContext<'_, Self>) -> Result<(), Self::Error> {
        let matched = Arc::clone(&self.matched);
        let pong = self.pong.clone();
        ctx.request::<Pong>(
            &pong,
            PingReq(1),
            Box::new(move |_actor, result, ctx| {
                if let ResponseResult::Ok(value) = result {
                    if let Ok(n) = value.downcast::<u64>() {
                        matched.store(*n == 1, Ordering::SeqCst);
                    }
                }
                ctx.quit(ExitReason::Normal);
            }),
        );
        Ok(())
    }
}

#[test]
#[allow(clippy::expect_used)]
fn ping_sends_one_and_both_actors_terminate_normally() {
    let system = SystemHandle::start(SystemConfig::default());
    let baseline = system.registry().len();

    let pong = system.spawn(Pong);
    let matched = Arc::new(AtomicBool::new(false));
    let ping = system.spawn(Ping { pong: pong.downgrade(), matched: Arc::clone(&matched) });

    let ping_weak = ping.downgrade();
    let pong_weak = pong.downgrade();
    system.send::<Ping>(&ping_weak, Go);
    drop(ping);
    drop(pong);

    let deadline = Instant::now() + Duration::from_secs(2);
    while (ping_weak.upgrade().is_some() || pong_weak.upgrade().is_some()) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(matched.load(Ordering::SeqCst), "ping(1) must round-trip to pong(1)");
    assert!(ping_weak.upgrade().is_none(), "ping actor must terminate");
    assert!(pong_weak.upgrade().is_none(), "pong actor must terminate");
    assert_eq!(system.registry().len(), baseline, "registry count must return to baseline");

    system.shutdown(None).expect("shutdown");
}
