//! Timer-driven emission against an in-memory transport, on tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use snitch_fc::emitter::ControlEmitter;
use snitch_fc::msp::{decode_rc, RcCommand, RC_FRAME_LEN};
use snitch_fc::pilot::{SharedPilot, ARM_VALUE, DISARM_VALUE};
use snitch_fc::safety::ClientCount;
use tokio::io::AsyncReadExt;

async fn collect(pilot: SharedPilot, clients: ClientCount, script: impl std::future::Future<Output = ()>) -> Vec<RcCommand> {
    let (tx, mut rx) = tokio::io::duplex(64 * 1024);
    let emitter = ControlEmitter::new(pilot, tx, clients, Arc::default());
    let handle = tokio::spawn(emitter.run(Duration::from_millis(20)));

    script.await;

    handle.abort();
    let _ = handle.await;
    let mut buf = Vec::new();
    rx.read_to_end(&mut buf).await.unwrap();
    assert_eq!(buf.len() % RC_FRAME_LEN, 0);
    buf.chunks(RC_FRAME_LEN).map(|f| decode_rc(f).unwrap()).collect()
}

#[tokio::test(start_paused = true)]
async fn steady_heartbeat_over_one_second() {
    let clients = ClientCount::new();
    let _session = clients.enter();
    let frames = collect(SharedPilot::default(), clients, tokio::time::sleep(Duration::from_millis(1000))).await;

    assert!((49..=51).contains(&frames.len()), "got {} frames", frames.len());
    // Nothing changed, but the controller still hears from us every tick.
    assert!(frames.iter().all(|f| f.aux1 == DISARM_VALUE && f.throttle == 1000));
}

#[tokio::test(start_paused = true)]
async fn operator_commands_land_on_next_tick() {
    let clients = ClientCount::new();
    let _session = clients.enter();
    let pilot = SharedPilot::default();
    let p = pilot.clone();

    let frames = collect(pilot, clients, async move {
        tokio::time::sleep(Duration::from_millis(105)).await;
        p.arm();
        p.set_throttle(1600);
        tokio::time::sleep(Duration::from_millis(100)).await;
    })
    .await;

    let first_armed = frames.iter().position(|f| f.aux1 == ARM_VALUE).expect("never armed");
    assert!(frames[..first_armed].iter().all(|f| f.throttle == 1000));
    assert!(frames[first_armed..].iter().all(|f| f.throttle == 1600));
}

#[tokio::test(start_paused = true)]
async fn dropped_session_cuts_throttle() {
    let clients = ClientCount::new();
    let session = clients.enter();
    let pilot = SharedPilot::default();
    pilot.arm();
    pilot.set_throttle(1800);
    let p = pilot.clone();

    let frames = collect(pilot, clients, async move {
        tokio::time::sleep(Duration::from_millis(105)).await;
        drop(session);
        tokio::time::sleep(Duration::from_millis(100)).await;
    })
    .await;

    assert_eq!(frames[0].throttle, 1800);
    let last = frames.last().unwrap();
    assert_eq!((last.throttle, last.aux1), (1000, DISARM_VALUE));
    assert!(!p.snapshot().armed);
}
