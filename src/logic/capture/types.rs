//! Capture Types - Frame, orientation, intrinsics, presets

use std::sync::Arc;
use chrono::{DateTime, Utc};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

// ============================================================================
// SESSION PRESET
// ============================================================================

/// Capture quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPreset {
    Low,
    #[default]
    Medium,
    High,
    Vga640x480,
    Hd1920x1080,
}

impl SessionPreset {
    /// Frame size (width, height) delivered by this preset
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            SessionPreset::Low => (192, 144),
            SessionPreset::Medium => (480, 360),
            SessionPreset::High => (1280, 720),
            SessionPreset::Vga640x480 => (640, 480),
            SessionPreset::Hd1920x1080 => (1920, 1080),
        }
    }
}

// ============================================================================
// ORIENTATION
// ============================================================================

/// Image orientation hint (EXIF numbering, 1..=8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl Orientation {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Orientation::Up),
            2 => Some(Orientation::UpMirrored),
            3 => Some(Orientation::Down),
            4 => Some(Orientation::DownMirrored),
            5 => Some(Orientation::LeftMirrored),
            6 => Some(Orientation::Right),
            7 => Some(Orientation::RightMirrored),
            8 => Some(Orientation::Left),
            _ => None,
        }
    }

    /// Unknown hints fall back to `Up`
    pub fn from_raw_or_up(raw: u32) -> Self {
        Self::from_raw(raw).unwrap_or_else(|| {
            log::debug!("Unknown orientation hint {}, using Up", raw);
            Orientation::Up
        })
    }

    /// True when the displayed image has width and height swapped
    pub fn swaps_axes(&self) -> bool {
        matches!(
            self,
            Orientation::LeftMirrored | Orientation::Right | Orientation::RightMirrored | Orientation::Left
        )
    }

    /// Map a coordinate in the upright (displayed) image back to the stored buffer.
    ///
    /// `w`/`h` are the stored buffer dimensions.
    pub fn source_coords(&self, x: usize, y: usize, w: usize, h: usize) -> (usize, usize) {
        match self {
            Orientation::Up => (x, y),
            Orientation::UpMirrored => (w - 1 - x, y),
            Orientation::Down => (w - 1 - x, h - 1 - y),
            Orientation::DownMirrored => (x, h - 1 - y),
            Orientation::LeftMirrored => (y, x),
            Orientation::Right => (y, h - 1 - x),
            Orientation::RightMirrored => (w - 1 - y, h - 1 - x),
            Orientation::Left => (w - 1 - y, x),
        }
    }
}

// ============================================================================
// FRAME
// ============================================================================

/// Camera intrinsic matrix (row-major 3x3)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics(pub [[f32; 3]; 3]);

impl CameraIntrinsics {
    /// Pinhole intrinsics with the principal point at the image center
    pub fn pinhole(focal_px: f32, width: usize, height: usize) -> Self {
        Self([
            [focal_px, 0.0, width as f32 / 2.0],
            [0.0, focal_px, height as f32 / 2.0],
            [0.0, 0.0, 1.0],
        ])
    }
}

/// One captured image sample. Pixels are BGRA, shape (height, width, 4).
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u64,
    pub captured_at: DateTime<Utc>,
    pub pixels: Arc<Array3<u8>>,
    pub orientation: Orientation,
    /// Copied into the request handed to the classifier
    pub intrinsics: Option<CameraIntrinsics>,
}

impl Frame {
    pub fn new(id: u64, pixels: Array3<u8>, orientation: Orientation) -> Self {
        Self {
            id,
            captured_at: Utc::now(),
            pixels: Arc::new(pixels),
            orientation,
            intrinsics: None,
        }
    }

    /// Solid-color frame, handy for replay sources and tests
    pub fn solid(id: u64, width: usize, height: usize, bgra: [u8; 4]) -> Self {
        let pixels = Array3::from_shape_fn((height, width, 4), |(_, _, c)| bgra[c]);
        Self::new(id, pixels, Orientation::Up)
    }

    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    pub fn width(&self) -> usize {
        self.pixels.shape()[1]
    }

    pub fn height(&self) -> usize {
        self.pixels.shape()[0]
    }
}
