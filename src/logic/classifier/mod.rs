//! Classifier Module - Bounded-concurrency frame classification
//!
//! K permits + K request slots (round-robin) + worker pool.

pub mod permits;
pub mod slots;
pub mod engine;

// Re-export common types
pub use engine::{ClassificationResult, ClassifierError, ClassifierStatus, CompletionHandler, FrameClassifier};
