//! Capture Module - Camera session & frame delivery
//!
//! Tách phần đọc camera khỏi phần classify.
//! Late frames bị bỏ ở đây (drop oldest), không phải ở classifier.

pub mod types;
pub mod device;
pub mod mailbox;
pub mod video_capture;

// Re-export common types
pub use types::{Frame, Orientation, SessionPreset};
pub use device::{CaptureDevice, DeviceProvider, SyntheticCamera};
pub use video_capture::{CaptureDelegate, CaptureStats, VideoCapture};
