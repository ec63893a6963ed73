//! Capture Devices - Nguồn frame cho VideoCapture
//!
//! Trait `CaptureDevice` tách phần đọc frame khỏi capture session.
//! Có sẵn camera tổng hợp (test pattern); camera replay chỉ dùng cho tests.

#[cfg(test)]
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use ndarray::Array3;
use rand::Rng;

use super::types::{CameraIntrinsics, Frame, Orientation, SessionPreset};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub struct CaptureError(pub String);

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CaptureError: {}", self.0)
    }
}

impl std::error::Error for CaptureError {}

// ============================================================================
// DEVICE TRAIT
// ============================================================================

/// A video device the capture session drains
pub trait CaptureDevice: Send {
    fn name(&self) -> &str;

    /// Prepare the device input for the given preset
    fn configure(&mut self, preset: SessionPreset) -> Result<(), CaptureError>;

    /// Block until the next frame is produced. `Ok(None)` ends the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Looks up the default video device; `None` when no device exists
pub type DeviceProvider = Box<dyn Fn() -> Option<Box<dyn CaptureDevice>> + Send + Sync>;

// ============================================================================
// SYNTHETIC CAMERA
// ============================================================================

/// Test-pattern camera paced at a fixed frame rate
pub struct SyntheticCamera {
    fps: u32,
    frame_limit: Option<u64>,
    orientation: Orientation,
    focal_px: Option<f32>,
    dimensions: Option<(usize, usize)>,
    produced: u64,
    next_deadline: Option<Instant>,
}

impl SyntheticCamera {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            frame_limit: None,
            orientation: Orientation::Up,
            focal_px: None,
            dimensions: None,
            produced: 0,
            next_deadline: None,
        }
    }

    /// Stop after `limit` frames
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Attach pinhole intrinsics to every frame
    pub fn with_focal_length(mut self, focal_px: Option<f32>) -> Self {
        self.focal_px = focal_px;
        self
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }

    /// Hue sweeps across red -> green -> blue over ~3 seconds of frames
    fn render(&self, width: usize, height: usize) -> Array3<u8> {
        let period = (self.fps as u64 * 3).max(1);
        let phase = (self.produced % period) as f32 / period as f32;
        let (r, g, b) = hue_to_rgb(phase);
        let mut rng = rand::thread_rng();
        let jitter: i16 = rng.gen_range(-8..=8);
        let px = |v: u8| (v as i16 + jitter).clamp(0, 255) as u8;
        let bgra = [px(b), px(g), px(r), 255];
        Array3::from_shape_fn((height, width, 4), |(_, _, c)| bgra[c])
    }
}

fn hue_to_rgb(phase: f32) -> (u8, u8, u8) {
    let third = 1.0 / 3.0;
    let t = (phase % third) / third;
    let up = (t * 255.0) as u8;
    let down = 255 - up;
    if phase < third {
        (down, up, 0)
    } else if phase < 2.0 * third {
        (0, down, up)
    } else {
        (up, 0, down)
    }
}

impl CaptureDevice for SyntheticCamera {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn configure(&mut self, preset: SessionPreset) -> Result<(), CaptureError> {
        self.dimensions = Some(preset.dimensions());
        self.next_deadline = None;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let (width, height) = self.dimensions
            .ok_or_else(|| CaptureError("Device not configured".to_string()))?;

        if let Some(limit) = self.frame_limit {
            if self.produced >= limit {
                return Ok(None);
            }
        }

        // Pace at device frame rate
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_deadline = Some(deadline.max(now) + self.frame_interval());

        let mut frame = Frame::new(self.produced, self.render(width, height), self.orientation);
        if let Some(focal) = self.focal_px {
            frame = frame.with_intrinsics(CameraIntrinsics::pinhole(focal, width, height));
        }
        self.produced += 1;
        Ok(Some(frame))
    }
}

// ============================================================================
// REPLAY CAMERA
// ============================================================================

/// Plays back a fixed list of frames, optionally paced
#[cfg(test)]
pub struct ReplayCamera {
    frames: VecDeque<Frame>,
    interval: Duration,
    configured: bool,
    reject_configuration: bool,
}

#[cfg(test)]
impl ReplayCamera {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            interval: Duration::ZERO,
            configured: false,
            reject_configuration: false,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Device exists but refuses to become an input
    pub fn rejecting() -> Self {
        Self {
            reject_configuration: true,
            ..Self::new(Vec::new())
        }
    }
}

#[cfg(test)]
impl CaptureDevice for ReplayCamera {
    fn name(&self) -> &str {
        "replay"
    }

    fn configure(&mut self, _preset: SessionPreset) -> Result<(), CaptureError> {
        if self.reject_configuration {
            return Err(CaptureError("Device input unavailable".to_string()));
        }
        self.configured = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.configured {
            return Err(CaptureError("Device not configured".to_string()));
        }
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        Ok(self.frames.pop_front())
    }
}
