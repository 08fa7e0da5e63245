use anyhow::Result;

use crate::camera::{CameraConfig, CAMERA_MODES};
use crate::frame::{FRAME_HEIGHT, FRAME_WIDTH};
use crate::VisionConfig;

pub fn check_camera(cfg: &CameraConfig) -> Result<()> {
    anyhow::ensure!(CAMERA_MODES.contains(&cfg.mode.as_str()), "camera.mode unknown: {}", cfg.mode);
    if cfg.mode == "replay" {
        anyhow::ensure!(
            cfg.replay_dir.as_ref().map(|s| !s.is_empty()).unwrap_or(false),
            "camera.replay_dir missing"
        );
    }
    if let (Some(w), Some(h)) = (cfg.capture_width, cfg.capture_height) {
        anyhow::ensure!(
            w as usize >= FRAME_WIDTH && h as usize >= FRAME_HEIGHT,
            "camera capture size {}x{} below {}x{}", w, h, FRAME_WIDTH, FRAME_HEIGHT
        );
    }
    Ok(())
}

pub fn check_vision(cfg: &VisionConfig) -> Result<()> {
    let p = cfg.scan_params();
    anyhow::ensure!((1..=255).contains(&p.sensitivity), "vision.sensitivity should be 1..255");
    anyhow::ensure!((0..=255).contains(&p.brightness_floor), "vision.brightness_floor should be 0..255");
    // One zone holds at most 54x40 pixels.
    anyhow::ensure!(p.min_threat_mass < 54 * 40, "vision.min_threat_mass larger than a zone");
    Ok(())
}
