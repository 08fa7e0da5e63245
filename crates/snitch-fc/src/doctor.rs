use anyhow::Result;
use tracing::warn;

use crate::pilot::EMIT_INTERVAL;
use crate::FcConfig;

pub fn check_fc(cfg: &FcConfig) -> Result<()> {
    match cfg.serial_dev.as_deref() {
        Some(dev) if !dev.is_empty() => {}
        _ => warn!("doctor: fc.serial_dev unset, running without a flight controller"),
    }
    anyhow::ensure!(cfg.baud.map(|b| b > 0).unwrap_or(true), "fc.baud invalid");
    if let Some(ms) = cfg.emit_interval_ms {
        anyhow::ensure!(
            ms as u128 >= EMIT_INTERVAL.as_millis(),
            "fc.emit_interval_ms below {}ms", EMIT_INTERVAL.as_millis()
        );
        anyhow::ensure!(ms <= 500, "fc.emit_interval_ms too slow for the controller failsafe");
    }
    cfg.zone_table()?;
    Ok(())
}
