//! Display Module - Main queue, text surfaces, result formatting

pub mod format;
pub mod main_queue;
pub mod surface;

// Re-export common types
pub use main_queue::{MainHandle, MainQueue};
pub use surface::{LogSurface, ResultsLabel, TextSurface};
