use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tracing::{info, trace, warn};

use crate::msp;
use crate::pilot::SharedPilot;
use crate::safety::{LinkEvent, LinkPresence, SafetyMonitor};
use crate::state::FcStatus;

/// Fixed-cadence heartbeat of RC requests towards the flight controller.
///
/// Every iteration polls link presence first; with no operator connected the
/// pilot is disarmed before the request is built.
pub struct ControlEmitter<W, P> {
    pilot: SharedPilot,
    sink: W,
    presence: P,
    safety: SafetyMonitor,
    status: Arc<Mutex<FcStatus>>,
}

impl<W, P> ControlEmitter<W, P>
where
    W: AsyncWrite + Unpin + Send,
    P: LinkPresence,
{
    pub fn new(pilot: SharedPilot, sink: W, presence: P, status: Arc<Mutex<FcStatus>>) -> Self {
        Self { pilot, sink, presence, safety: SafetyMonitor::new(), status }
    }

    /// One control iteration. Returns the frame written, if the cadence gate let one out.
    pub async fn step(&mut self, now: Instant) -> Option<Bytes> {
        let ev = self.safety.poll(self.presence.connected_clients());
        match ev {
            LinkEvent::Lost => warn!("safety: control link lost, disarming"),
            LinkEvent::Restored => info!("safety: control link present"),
            _ => {}
        }
        // Lock is held only for disarm + tick; encode and write happen outside it.
        let rc = self.pilot.tick_with_link(now, ev)?;
        let frame = msp::encode_rc(&rc);
        trace!("fc: rc {:?}", rc);

        let res = self.sink.write_all(&frame).await;
        let mut st = self.status.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match res {
            Ok(()) => {
                st.frames_sent += 1;
                st.last_write = Some(now);
            }
            Err(e) => {
                // Not retried: the next tick carries fresh state anyway.
                st.write_failures += 1;
                st.last_error = Some(e.to_string());
                warn!("fc: write failed: {}", e);
            }
        }
        Some(frame)
    }

    /// Runs for the process lifetime on a timer of `period`.
    pub async fn run(mut self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let t = ticker.tick().await;
            self.step(t.into_std()).await;
        }
    }

    pub fn into_sink(self) -> W {
        self.sink
    }
}
