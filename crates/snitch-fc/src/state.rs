use std::time::{Duration, Instant};

use snitch_proto::telemetry::FcHealth;

/// Transport-side view of the flight controller link.
#[derive(Debug, Clone, Default)]
pub struct FcStatus {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub frames_sent: u64,
    pub write_failures: u64,
    pub last_write: Option<Instant>,
    pub last_error: Option<String>,
}

impl FcStatus {
    pub fn write_age(&self) -> Option<Duration> {
        self.last_write.map(|t| t.elapsed())
    }

    pub fn health(&self) -> FcHealth {
        FcHealth {
            port: self.port.clone(),
            baud: self.baud,
            frames_sent: self.frames_sent,
            write_failures: self.write_failures,
            last_write_age_ms: self.write_age().map(|d| d.as_millis() as u64),
            last_error: self.last_error.clone(),
        }
    }
}
