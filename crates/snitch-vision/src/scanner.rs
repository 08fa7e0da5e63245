use snitch_proto::threat::{Threat, ZONE_COUNT};
use tracing::{debug, warn};

use crate::frame::{Frame, FRAME_HEIGHT, FRAME_WIDTH};

/// Every Nth byte is sampled for the room baseline.
pub const CALIBRATION_STRIDE: usize = 8;
/// Lowest baseline (and fallback threshold) we accept.
pub const BRIGHTNESS_FLOOR: i32 = 40;
/// How much darker than the room a pixel has to be to count as mass.
pub const SENSITIVITY: i32 = 50;
/// Zone mass needed before a verdict turns active.
pub const MIN_THREAT_MASS: u32 = 400;

// Grid splits for a 160x120 frame. Must be re-derived if the geometry changes.
const ROW_SPLITS: [usize; 2] = [40, 80];
const COL_SPLITS: [usize; 2] = [53, 106];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    pub sensitivity: i32,
    pub min_threat_mass: u32,
    pub brightness_floor: i32,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            sensitivity: SENSITIVITY,
            min_threat_mass: MIN_THREAT_MASS,
            brightness_floor: BRIGHTNESS_FLOOR,
        }
    }
}

/// Result of the one-off room calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Baseline used for every later scan, never below the floor.
    pub baseline: i32,
    /// Raw mean of the sampled bytes.
    pub sampled_mean: i32,
    /// The room was darker than the floor and the baseline was clamped.
    pub low_light: bool,
}

impl Calibration {
    /// Mean brightness over every `CALIBRATION_STRIDE`th byte, clamped to `floor`.
    pub fn from_frame(frame: &Frame, floor: i32) -> Self {
        let (sum, count) = frame
            .data()
            .iter()
            .step_by(CALIBRATION_STRIDE)
            .fold((0u64, 0u64), |(s, n), &px| (s + u64::from(px), n + 1));

        let sampled_mean = if count == 0 { 0 } else { (sum / count) as i32 };
        let cal = Self::from_mean(sampled_mean, floor);
        if cal.low_light {
            warn!(
                "calibration: room too dark (mean={}), baseline clamped to {}",
                sampled_mean, cal.baseline
            );
        } else {
            debug!("calibration: baseline={} from {} samples", cal.baseline, count);
        }
        cal
    }

    pub fn from_mean(sampled_mean: i32, floor: i32) -> Self {
        let low_light = sampled_mean < floor;
        Self {
            baseline: if low_light { floor } else { sampled_mean },
            sampled_mean,
            low_light,
        }
    }
}

/// Zone-grid threat detector over a calibrated room baseline.
///
/// The baseline is fixed at construction; there is no re-calibration during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreatScanner {
    params: ScanParams,
    baseline: i32,
}

impl ThreatScanner {
    pub fn new(params: ScanParams, calibration: &Calibration) -> Self {
        Self::with_baseline(params, calibration.baseline)
    }

    pub fn with_baseline(params: ScanParams, baseline: i32) -> Self {
        Self { params, baseline: baseline.max(params.brightness_floor) }
    }

    pub fn baseline(&self) -> i32 {
        self.baseline
    }

    /// Pixels strictly below this value count as mass.
    pub fn dynamic_threshold(&self) -> i32 {
        let t = self.baseline - self.params.sensitivity;
        if t < 0 { self.params.brightness_floor } else { t }
    }

    /// Counts sub-threshold pixels per zone and reports the heaviest zone.
    ///
    /// A missing frame, or one with a geometry other than 160x120, yields an
    /// inactive verdict with no zone.
    pub fn scan(&self, frame: Option<&Frame>) -> Threat {
        let Some(frame) = frame else { return Threat::NONE; };
        if !frame.is_standard() {
            warn!(
                "scan: unexpected frame geometry {}x{} (want {}x{})",
                frame.width(), frame.height(), FRAME_WIDTH, FRAME_HEIGHT
            );
            return Threat::NONE;
        }

        let counts = self.zone_counts(frame);

        // Strictly greater wins, so ties keep the lowest zone index.
        let mut best: Option<(usize, u32)> = None;
        for (zone, &count) in counts.iter().enumerate() {
            if count > best.map_or(0, |(_, c)| c) {
                best = Some((zone, count));
            }
        }

        let (zone, mass) = match best {
            Some((z, m)) => (Some(z as u8), m),
            None => (None, 0),
        };
        Threat { active: mass > self.params.min_threat_mass, zone, mass }
    }

    pub fn zone_counts(&self, frame: &Frame) -> [u32; ZONE_COUNT] {
        let threshold = self.dynamic_threshold();
        let mut counts = [0u32; ZONE_COUNT];

        for (y, row) in frame.rows().enumerate() {
            let y_offset = grid_cell(y, ROW_SPLITS) * 3;
            for (x, &px) in row.iter().enumerate() {
                if i32::from(px) < threshold {
                    counts[y_offset + grid_cell(x, COL_SPLITS)] += 1;
                }
            }
        }
        counts
    }
}

fn grid_cell(v: usize, splits: [usize; 2]) -> usize {
    if v < splits[0] {
        0
    } else if v < splits[1] {
        1
    } else {
        2
    }
}
