use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum spacing between emissions.
#[derive(Debug, Clone)]
pub struct CadenceGate {
    last: Option<Instant>,
    min_interval: Duration,
}

impl CadenceGate {
    pub fn new(min_interval: Duration) -> Self {
        Self { last: None, min_interval }
    }

    /// Returns true and records `now` if at least one interval has passed.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(t) = self.last {
            if now.saturating_duration_since(t) < self.min_interval { return false; }
        }
        self.last = Some(now);
        true
    }

    pub fn last(&self) -> Option<Instant> { self.last }
}

/// "Is anyone holding the control link?" Polled once per control iteration.
pub trait LinkPresence: Send {
    fn connected_clients(&self) -> usize;
}

/// Session counter shared between the operator surface and the control loop.
#[derive(Debug, Clone, Default)]
pub struct ClientCount(Arc<AtomicUsize>);

impl ClientCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a session until the returned guard is dropped.
    pub fn enter(&self) -> ClientGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        ClientGuard(self.0.clone())
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl LinkPresence for ClientCount {
    fn connected_clients(&self) -> usize {
        self.get()
    }
}

#[derive(Debug)]
pub struct ClientGuard(Arc<AtomicUsize>);

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Link up, was up.
    Present,
    /// Link just came back. Does not re-arm.
    Restored,
    /// Link just dropped: force disarm.
    Lost,
    /// Still no link: keep forcing disarm.
    Absent,
}

impl LinkEvent {
    pub fn forces_disarm(self) -> bool {
        matches!(self, LinkEvent::Lost | LinkEvent::Absent)
    }
}

/// Dead-man switch over the presence signal. No debounce: one empty poll is enough.
#[derive(Debug, Default)]
pub struct SafetyMonitor {
    present: bool,
}

impl SafetyMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll(&mut self, connected_clients: usize) -> LinkEvent {
        let now_present = connected_clients > 0;
        let ev = match (self.present, now_present) {
            (true, true) => LinkEvent::Present,
            (false, true) => LinkEvent::Restored,
            (true, false) => LinkEvent::Lost,
            (false, false) => LinkEvent::Absent,
        };
        self.present = now_present;
        ev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_admits_first_and_spaced() {
        let mut g = CadenceGate::new(Duration::from_millis(20));
        let t0 = Instant::now();
        assert!(g.admit(t0));
        assert!(!g.admit(t0));
        assert!(!g.admit(t0 + Duration::from_millis(19)));
        assert!(g.admit(t0 + Duration::from_millis(25)));
        // measured from the last admitted instant
        assert!(!g.admit(t0 + Duration::from_millis(44)));
        assert!(g.admit(t0 + Duration::from_millis(45)));
    }

    #[test]
    fn gate_tolerates_clock_going_backwards() {
        let mut g = CadenceGate::new(Duration::from_millis(20));
        let t0 = Instant::now() + Duration::from_secs(1);
        assert!(g.admit(t0));
        assert!(!g.admit(t0 - Duration::from_millis(5)));
    }

    #[test]
    fn monitor_transitions() {
        let mut m = SafetyMonitor::new();
        assert_eq!(m.poll(0), LinkEvent::Absent);
        assert_eq!(m.poll(1), LinkEvent::Restored);
        assert_eq!(m.poll(3), LinkEvent::Present);
        assert_eq!(m.poll(0), LinkEvent::Lost);
        assert_eq!(m.poll(0), LinkEvent::Absent);
        assert!(LinkEvent::Lost.forces_disarm());
        assert!(LinkEvent::Absent.forces_disarm());
        assert!(!LinkEvent::Restored.forces_disarm());
    }

    #[test]
    fn client_guards_track_sessions() {
        let count = ClientCount::new();
        let a = count.enter();
        let b = count.enter();
        assert_eq!(count.connected_clients(), 2);
        drop(a);
        assert_eq!(count.connected_clients(), 1);
        drop(b);
        assert_eq!(count.connected_clients(), 0);
    }
}
