pub mod camera;
pub mod doctor;
pub mod frame;
pub mod perception;
pub mod scanner;

use serde::Deserialize;

pub use frame::{Frame, FrameError, FrameSource, ReplaySource};
pub use perception::PerceptionTask;
pub use scanner::{Calibration, ScanParams, ThreatScanner};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisionConfig {
    /// Start with vision-driven control switched on. Default off; operators toggle it.
    pub enabled_at_start: Option<bool>,

    /// Brightness drop below the room baseline that counts as mass. Default 50.
    pub sensitivity: Option<i32>,

    /// Zone mass needed for an active verdict. Default 400.
    pub min_threat_mass: Option<u32>,

    /// Lowest accepted calibration baseline. Default 40.
    pub brightness_floor: Option<i32>,

    /// Optional pause between perception cycles (ms). Default 0 (camera-paced).
    pub scan_interval_ms: Option<u64>,
}

impl VisionConfig {
    pub fn scan_params(&self) -> ScanParams {
        let d = ScanParams::default();
        ScanParams {
            sensitivity: self.sensitivity.unwrap_or(d.sensitivity),
            min_threat_mass: self.min_threat_mass.unwrap_or(d.min_threat_mass),
            brightness_floor: self.brightness_floor.unwrap_or(d.brightness_floor),
        }
    }

    pub fn scan_interval(&self) -> Option<std::time::Duration> {
        self.scan_interval_ms.map(std::time::Duration::from_millis)
    }
}
