//! Inference Engine - Classifier trait & shared types
//!
//! Tách phần model khỏi pipeline để dễ swap backend (ONNX, fallback).

use serde::{Deserialize, Serialize};

use crate::logic::capture::Frame;
use crate::logic::capture::types::CameraIntrinsics;
use super::preprocess::CropAndScale;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// One ranked label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub label: String,
    pub confidence: f32, // 0.0 - 1.0
}

impl Observation {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Sort descending by confidence (NaN sinks to the end)
pub fn rank(observations: &mut [Observation]) {
    observations.sort_by(|a, b| {
        let ka = if a.confidence.is_nan() { f32::NEG_INFINITY } else { a.confidence };
        let kb = if b.confidence.is_nan() { f32::NEG_INFINITY } else { b.confidence };
        kb.total_cmp(&ka)
    });
}

/// Reusable per-slot request context
///
/// Lives for the whole session; the scratch tensor is allocated once per slot.
#[derive(Debug)]
pub struct VisionRequest {
    pub slot: usize,
    pub crop_and_scale: CropAndScale,
    /// Camera intrinsics of the frame being classified, when the device reports them
    pub intrinsics: Option<CameraIntrinsics>,
    pub input: Vec<f32>,
}

impl VisionRequest {
    pub fn new(slot: usize, crop_and_scale: CropAndScale) -> Self {
        Self {
            slot,
            crop_and_scale,
            intrinsics: None,
            input: Vec::new(),
        }
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub struct InferenceError(pub String);

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InferenceError: {}", self.0)
    }
}

impl std::error::Error for InferenceError {}

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// Trait cho image classifiers (ONNX, heuristics, test doubles)
///
/// Called concurrently from up to K worker threads, each with its own slot.
pub trait ImageClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Classify one frame. Observations may come back in any order.
    fn classify(&self, frame: &Frame, request: &mut VisionRequest) -> Result<Vec<Observation>, InferenceError>;
}
