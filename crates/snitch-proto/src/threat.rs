use serde::{Deserialize, Serialize};

/// Number of cells in the 3x3 zone grid.
pub const ZONE_COUNT: usize = 9;

/// Verdict of one scan cycle.
///
/// Zones are numbered row-major from the top-left cell:
/// 0, 1, 2 are the "front" of the vehicle, 3, 4, 5 the middle and 6, 7, 8 the back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threat {
    pub active: bool,
    /// Heaviest zone, `None` when no pixel fell under the threshold.
    pub zone: Option<u8>,
    pub mass: u32,
}

impl Threat {
    /// Inactive verdict used when no frame could be scanned.
    pub const NONE: Threat = Threat { active: false, zone: None, mass: 0 };

    /// Zone index with `-1` standing in for "no zone".
    pub fn zone_index(&self) -> i32 {
        self.zone.map(i32::from).unwrap_or(-1)
    }
}

impl Default for Threat {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_reports_sentinel_zone() {
        let t = Threat::default();
        assert!(!t.active);
        assert_eq!(t.zone_index(), -1);
        assert_eq!(t.mass, 0);
    }

    #[test]
    fn zone_index_passes_through() {
        let t = Threat { active: true, zone: Some(8), mass: 401 };
        assert_eq!(t.zone_index(), 8);
    }
}
