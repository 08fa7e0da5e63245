use anyhow::Result;
use image::GrayImage;
use thiserror::Error;

/// Geometry every scanner and camera path agrees on (QQVGA).
pub const FRAME_WIDTH: usize = 160;
pub const FRAME_HEIGHT: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame buffer holds {got} bytes, {width}x{height} needs {expected}")]
    LengthMismatch { width: usize, height: usize, expected: usize, got: usize },
    #[error("frame geometry {width}x{height} is empty")]
    Empty { width: usize, height: usize },
}

/// Single-channel intensity image, row-major, one byte per sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty { width, height });
        }
        let expected = width * height;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch { width, height, expected, got: data.len() });
        }
        Ok(Self { width, height, data })
    }

    /// Uniform frame of the standard geometry.
    pub fn filled(value: u8) -> Self {
        Self { width: FRAME_WIDTH, height: FRAME_HEIGHT, data: vec![value; FRAME_WIDTH * FRAME_HEIGHT] }
    }

    pub fn from_luma(img: GrayImage) -> Self {
        let (w, h) = img.dimensions();
        Self { width: w as usize, height: h as usize, data: img.into_raw() }
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }
    pub fn data(&self) -> &[u8] { &self.data }

    pub fn is_standard(&self) -> bool {
        self.width == FRAME_WIDTH && self.height == FRAME_HEIGHT
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.width)
    }

    /// Paints a rectangle, clipped to the frame bounds.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, value: u8) {
        let x_end = (x + w).min(self.width);
        let y_end = (y + h).min(self.height);
        for row in y.min(self.height)..y_end {
            let start = row * self.width;
            self.data[start + x.min(x_end)..start + x_end].fill(value);
        }
    }
}

/// Producer of camera frames.
///
/// `acquire` hands ownership of a frame to the caller; the caller gives it back with
/// `release` once the scan cycle is over. `Ok(None)` means no frame this cycle.
pub trait FrameSource: Send {
    fn acquire(&mut self) -> Result<Option<Frame>>;

    fn release(&mut self, frame: Frame) {
        drop(frame);
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn acquire(&mut self) -> Result<Option<Frame>> {
        (**self).acquire()
    }

    fn release(&mut self, frame: Frame) {
        (**self).release(frame)
    }
}

/// Cycles through a fixed set of frames. Used for bench runs and tests.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    frames: Vec<Frame>,
    next: usize,
    acquired: u64,
    released: u64,
}

impl ReplaySource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames, next: 0, acquired: 0, released: 0 }
    }

    pub fn acquired(&self) -> u64 { self.acquired }
    pub fn released(&self) -> u64 { self.released }
}

impl FrameSource for ReplaySource {
    fn acquire(&mut self) -> Result<Option<Frame>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        let frame = self.frames[self.next].clone();
        self.next = (self.next + 1) % self.frames.len();
        self.acquired += 1;
        Ok(Some(frame))
    }

    fn release(&mut self, frame: Frame) {
        self.released += 1;
        drop(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = Frame::new(4, 4, vec![0; 15]).unwrap_err();
        assert_eq!(err, FrameError::LengthMismatch { width: 4, height: 4, expected: 16, got: 15 });
        assert!(matches!(Frame::new(0, 4, vec![]), Err(FrameError::Empty { .. })));
    }

    #[test]
    fn fill_rect_clips_to_bounds() {
        let mut f = Frame::new(4, 3, vec![9; 12]).unwrap();
        f.fill_rect(2, 1, 10, 10, 0);
        assert_eq!(f.data(), &[9, 9, 9, 9, 9, 9, 0, 0, 9, 9, 0, 0]);
    }

    #[test]
    fn replay_cycles_and_counts() {
        let mut src = ReplaySource::new(vec![Frame::filled(1), Frame::filled(2)]);
        let a = src.acquire().unwrap().unwrap();
        let b = src.acquire().unwrap().unwrap();
        let c = src.acquire().unwrap().unwrap();
        assert_eq!(a.data()[0], 1);
        assert_eq!(b.data()[0], 2);
        assert_eq!(c.data()[0], 1);
        src.release(a);
        assert_eq!(src.acquired(), 3);
        assert_eq!(src.released(), 1);
    }

    #[test]
    fn empty_replay_yields_nothing() {
        let mut src = ReplaySource::default();
        assert!(src.acquire().unwrap().is_none());
    }
}
