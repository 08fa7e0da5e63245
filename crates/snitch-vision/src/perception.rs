use std::time::Duration;

use snitch_proto::threat::Threat;
use tracing::{debug, warn};

use crate::frame::FrameSource;
use crate::scanner::ThreatScanner;

/// Continuous acquire -> scan -> fold -> release loop.
///
/// `fold` receives each verdict and is the only place shared flight state is
/// touched, so the camera is never waited on while that state is locked.
pub struct PerceptionTask<S, F> {
    source: S,
    scanner: ThreatScanner,
    fold: F,
    pace: Option<Duration>,
    cycles: u64,
    failures: u64,
}

impl<S, F> PerceptionTask<S, F>
where
    S: FrameSource,
    F: FnMut(Threat) + Send,
{
    pub fn new(source: S, scanner: ThreatScanner, fold: F) -> Self {
        Self { source, scanner, fold, pace: None, cycles: 0, failures: 0 }
    }

    /// Minimum time between cycles; unset means run flat out on the camera.
    pub fn with_pace(mut self, pace: Option<Duration>) -> Self {
        self.pace = pace.filter(|d| !d.is_zero());
        self
    }

    pub fn cycles(&self) -> u64 { self.cycles }
    pub fn failures(&self) -> u64 { self.failures }

    /// One perception cycle. Acquisition failures degrade to an inactive verdict.
    pub fn step(&mut self) -> Threat {
        let frame = match self.source.acquire() {
            Ok(f) => f,
            Err(e) => {
                self.failures += 1;
                warn!("perception: frame acquisition failed: {:#}", e);
                None
            }
        };

        let threat = self.scanner.scan(frame.as_ref());
        (self.fold)(threat);

        if let Some(f) = frame {
            self.source.release(f);
        }

        self.cycles += 1;
        if threat.active {
            debug!("perception: threat zone={} mass={}", threat.zone_index(), threat.mass);
        }
        threat
    }

    /// Runs for the process lifetime. Call from a blocking thread.
    pub fn run(mut self) {
        loop {
            self.step();
            if let Some(p) = self.pace {
                std::thread::sleep(p);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, ReplaySource};
    use crate::scanner::ScanParams;
    use anyhow::Result;
    use std::sync::{Arc, Mutex};

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn acquire(&mut self) -> Result<Option<Frame>> {
            anyhow::bail!("sensor timeout")
        }
    }

    #[test]
    fn folds_every_verdict_and_releases_frames() {
        let mut dark = Frame::filled(200);
        dark.fill_rect(0, 0, 53, 40, 0);
        let src = ReplaySource::new(vec![dark, Frame::filled(200)]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let scanner = ThreatScanner::with_baseline(ScanParams::default(), 120);
        let mut task = PerceptionTask::new(src, scanner, move |t| sink.lock().unwrap().push(t));
        task.step();
        task.step();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].active);
        assert_eq!(seen[0].zone, Some(0));
        assert_eq!(seen[0].mass, 53 * 40);
        assert!(!seen[1].active);
        assert_eq!(task.source.released(), 2);
        assert_eq!(task.cycles(), 2);
    }

    #[test]
    fn acquisition_failure_folds_inactive_verdict() {
        let mut got = None;
        let scanner = ThreatScanner::with_baseline(ScanParams::default(), 120);
        let mut task = PerceptionTask::new(FailingSource, scanner, |t| got = Some(t));
        let t = task.step();
        assert_eq!(t, Threat::NONE);
        assert_eq!(task.failures(), 1);
        drop(task);
        assert_eq!(got, Some(Threat::NONE));
    }
}
