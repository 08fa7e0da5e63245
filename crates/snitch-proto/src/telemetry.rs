use serde::{Deserialize, Serialize};

use crate::threat::Threat;

/// Snapshot of the vehicle returned to operators on request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub ts_unix_ms: i64,
    pub armed: bool,
    pub throttle: u16,
    pub yaw: u16,
    pub pitch: u16,
    pub roll: u16,
    pub vision_enabled: bool,
    // Link health
    pub link_clients: usize,
    // Perception
    pub last_threat: Option<Threat>,
    pub fc: FcHealth,
}

/// Flight controller transport health.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcHealth {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub frames_sent: u64,
    pub write_failures: u64,
    /// Milliseconds since the last successful write.
    pub last_write_age_ms: Option<u64>,
    pub last_error: Option<String>,
}
