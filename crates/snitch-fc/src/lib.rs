pub mod doctor;
pub mod emitter;
pub mod link;
pub mod msp;
pub mod pilot;
pub mod safety;
pub mod state;

use std::time::Duration;

use serde::Deserialize;

use crate::pilot::{Pilot, ThrottleAuthority, ZoneResponseCfg, ZoneTable, EMIT_INTERVAL};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FcConfig {
    /// Flight controller UART, e.g. "/dev/ttyAMA0". Unset: frames are discarded (bench mode).
    pub serial_dev: Option<String>,

    /// Default 115200.
    pub baud: Option<u32>,

    /// Spacing between RC requests. Default and minimum 20ms.
    pub emit_interval_ms: Option<u64>,

    /// "vision" (default) or "operator". See [`ThrottleAuthority`].
    pub throttle_authority: Option<ThrottleAuthority>,

    /// Threat zone responses. Replaces the built-in table when present.
    /// Example:
    /// [[fc.zone_response]]
    /// zone = 1
    /// pitch = 1200
    pub zone_response: Option<Vec<ZoneResponseCfg>>,
}

impl FcConfig {
    pub fn emit_interval(&self) -> Duration {
        self.emit_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(EMIT_INTERVAL)
            .max(EMIT_INTERVAL)
    }

    pub fn zone_table(&self) -> anyhow::Result<ZoneTable> {
        match &self.zone_response {
            Some(entries) => ZoneTable::from_entries(entries),
            None => Ok(ZoneTable::default()),
        }
    }

    pub fn build_pilot(&self) -> anyhow::Result<Pilot> {
        Ok(Pilot::new(
            self.zone_table()?,
            self.throttle_authority.unwrap_or_default(),
            self.emit_interval(),
        ))
    }
}
