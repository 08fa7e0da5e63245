//! Camera frame in, MSP bytes out: perception and emission sharing one pilot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use snitch_fc::emitter::ControlEmitter;
use snitch_fc::msp::decode_rc;
use snitch_fc::pilot::{Pilot, SharedPilot, ThrottleAuthority, ZoneTable, ARM_VALUE, EMIT_INTERVAL};
use snitch_fc::safety::ClientCount;
use snitch_vision::{Frame, PerceptionTask, ReplaySource, ScanParams, ThreatScanner};

fn threat_frame() -> Frame {
    let mut f = Frame::filled(200);
    f.fill_rect(60, 0, 40, 40, 0); // top-middle
    f
}

#[tokio::test]
async fn top_middle_threat_reaches_the_wire_as_pitch() {
    let mut pilot = Pilot::new(ZoneTable::default(), ThrottleAuthority::Vision, EMIT_INTERVAL);
    pilot.set_vision(true);
    let pilot = SharedPilot::new(pilot);
    pilot.arm();
    pilot.set_throttle(1500);

    let clients = ClientCount::new();
    let _session = clients.enter();
    let mut emitter = ControlEmitter::new(pilot.clone(), Vec::new(), clients, Arc::default());

    let fold = pilot.clone();
    let scanner = ThreatScanner::with_baseline(ScanParams::default(), 150);
    let mut perception = PerceptionTask::new(
        ReplaySource::new(vec![threat_frame(), Frame::filled(200)]),
        scanner,
        move |t| fold.apply_threat(t),
    );

    let t0 = Instant::now();
    let threat = perception.step();
    assert_eq!((threat.active, threat.zone), (true, Some(1)));
    let rc = decode_rc(&emitter.step(t0).await.unwrap()).unwrap();
    assert_eq!((rc.pitch, rc.throttle, rc.aux1), (1200, 1500, ARM_VALUE));

    // Clear sky: hover posture, and under vision authority the throttle drops to the floor.
    assert!(!perception.step().active);
    let rc = decode_rc(&emitter.step(t0 + Duration::from_millis(20)).await.unwrap()).unwrap();
    assert_eq!((rc.pitch, rc.throttle), (1500, 1000));
}

#[test]
fn perception_thread_and_operator_share_state() {
    let pilot = SharedPilot::default();
    pilot.apply_command(snitch_proto::OperatorCommand::ToggleVision);

    let fold = pilot.clone();
    let scanner = ThreatScanner::with_baseline(ScanParams::default(), 150);
    let mut task = PerceptionTask::new(ReplaySource::new(vec![threat_frame()]), scanner, move |t| fold.apply_threat(t));
    let worker = std::thread::spawn(move || {
        for _ in 0..200 {
            task.step();
        }
    });
    for v in 1000..1200 {
        pilot.set_throttle(v);
        let s = pilot.snapshot();
        assert!((1000..=2000).contains(&s.throttle));
    }
    worker.join().unwrap();
    assert_eq!(pilot.snapshot().pitch, 1200);
}
