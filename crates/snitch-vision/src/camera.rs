use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use tracing::{debug, info};

use crate::frame::{Frame, FrameSource, FRAME_HEIGHT, FRAME_WIDTH};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CameraConfig {
    pub mode: String,               // "libcamera-jpeg" | "v4l2-mjpeg" | "replay"
    pub device: Option<String>,     // /dev/video0 (v4l2)
    pub replay_dir: Option<String>, // directory of jpeg/png frames (replay)
    /// Capture size before downscaling to 160x120. Defaults to 320x240.
    pub capture_width: Option<u32>,
    pub capture_height: Option<u32>,
}

impl CameraConfig {
    fn capture_size(&self) -> (u32, u32) {
        (self.capture_width.unwrap_or(320), self.capture_height.unwrap_or(240))
    }
}

pub const CAMERA_MODES: [&str; 3] = ["libcamera-jpeg", "v4l2-mjpeg", "replay"];

/// Builds the frame source named by `cfg.mode`.
pub fn open_source(cfg: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    match cfg.mode.as_str() {
        "libcamera-jpeg" | "v4l2-mjpeg" => Ok(Box::new(CameraSource::new(cfg.clone()))),
        "replay" => {
            let dir = cfg.replay_dir.as_ref().context("camera.replay_dir missing (mode=replay)")?;
            Ok(Box::new(ImageDirSource::open(dir)?))
        }
        other => anyhow::bail!("unknown camera.mode: {}", other),
    }
}

/// Decodes a JPEG/PNG buffer into a 160x120 luma frame.
pub fn decode_gray(bytes: &[u8]) -> Result<Frame> {
    let img = image::load_from_memory(bytes).context("decode camera image")?;
    let gray = img.to_luma8();
    let gray = if gray.dimensions() == (FRAME_WIDTH as u32, FRAME_HEIGHT as u32) {
        gray
    } else {
        imageops::resize(&gray, FRAME_WIDTH as u32, FRAME_HEIGHT as u32, FilterType::Triangle)
    };
    Ok(Frame::from_luma(gray))
}

/// Pragmatic capture:
/// - libcamera-jpeg: call `libcamera-still -n -t 1 --width ... --height ... -o -`
///   returns a JPEG frame on stdout
/// - v4l2-mjpeg: call `ffmpeg` to grab a single MJPEG frame
///
/// Both block until the frame is ready; run from a blocking thread.
pub struct CameraSource {
    cfg: CameraConfig,
}

impl CameraSource {
    pub fn new(cfg: CameraConfig) -> Self {
        Self { cfg }
    }

    fn capture_jpeg(&self) -> Result<Vec<u8>> {
        match self.cfg.mode.as_str() {
            "libcamera-jpeg" => self.capture_libcamera(),
            "v4l2-mjpeg" => self.capture_v4l2_ffmpeg(),
            other => anyhow::bail!("unknown camera.mode: {}", other),
        }
    }

    fn capture_libcamera(&self) -> Result<Vec<u8>> {
        let (w, h) = self.cfg.capture_size();
        let (w, h) = (w.to_string(), h.to_string());
        let mut cmd = Command::new("libcamera-still");
        cmd.args([
            "-n",                 // no preview
            "-t", "1",            // 1ms
            "--width", w.as_str(),
            "--height", h.as_str(),
            "-o", "-",            // stdout
        ]);

        debug!("capture: libcamera-still");
        let out = cmd.output().context("run libcamera-still")?;
        anyhow::ensure!(out.status.success(), "libcamera-still failed");
        Ok(out.stdout)
    }

    fn capture_v4l2_ffmpeg(&self) -> Result<Vec<u8>> {
        let (w, h) = self.cfg.capture_size();
        let size = format!("{}x{}", w, h);
        let device = self.cfg.device.as_deref().unwrap_or("/dev/video0");
        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-hide_banner","-loglevel","error",
            "-f","video4linux2",
            "-input_format","mjpeg",
            "-video_size",size.as_str(),
            "-i",device,
            "-vframes","1",
            "-f","image2pipe",
            "-vcodec","mjpeg",
            "-",
        ]);

        debug!("capture: ffmpeg v4l2");
        let out = cmd.output().context("run ffmpeg capture")?;
        anyhow::ensure!(out.status.success(), "ffmpeg capture failed");
        Ok(out.stdout)
    }
}

impl FrameSource for CameraSource {
    fn acquire(&mut self) -> Result<Option<Frame>> {
        let jpeg = self.capture_jpeg()?;
        Ok(Some(decode_gray(&jpeg)?))
    }
}

/// Replays still images from a directory in file-name order, looping forever.
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("read replay dir {}", dir.display()))? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        anyhow::ensure!(!paths.is_empty(), "no jpeg/png frames in {}", dir.display());
        paths.sort();
        info!("camera: replaying {} frames from {}", paths.len(), dir.display());
        Ok(Self { paths, next: 0 })
    }
}

impl FrameSource for ImageDirSource {
    fn acquire(&mut self) -> Result<Option<Frame>> {
        let path = &self.paths[self.next];
        self.next = (self.next + 1) % self.paths.len();
        let bytes = std::fs::read(path).with_context(|| format!("read frame {}", path.display()))?;
        Ok(Some(decode_gray(&bytes)?))
    }
}
