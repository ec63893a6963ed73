//! ONNX Classifier - ONNX Runtime backend
//!
//! Load và chạy image classification model (NCHW RGB input, 1xN scores output).
//! Mỗi request slot có session riêng để K inference chạy song song.

use std::path::Path;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Value;

use crate::logic::capture::Frame;
use super::inference::{ImageClassifier, InferenceError, Observation, VisionRequest};
use super::labels::Labels;
use super::preprocess::{fill_input, to_array, Normalization};

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxOptions {
    /// Square input edge
    pub input_size: usize,
    pub normalization: Normalization,
    /// Model emits logits rather than probabilities
    pub apply_softmax: bool,
}

impl Default for OnnxOptions {
    fn default() -> Self {
        Self {
            input_size: crate::constants::DEFAULT_INPUT_SIZE,
            normalization: Normalization::imagenet(),
            apply_softmax: true,
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct OnnxClassifier {
    sessions: Vec<Mutex<Session>>,
    output_name: String,
    labels: Labels,
    options: OnnxOptions,
}

fn build_session(model_path: &Path) -> Result<Session, InferenceError> {
    Session::builder()
        .map_err(|e| InferenceError(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError(format!("Failed to set optimization: {}", e)))?
        .commit_from_file(model_path)
        .map_err(|e| InferenceError(format!("Failed to load model: {}", e)))
}

impl OnnxClassifier {
    /// Load `sessions` independent sessions of the same model
    pub fn load(model_path: &Path, labels: Labels, options: OnnxOptions, sessions: usize) -> Result<Self, InferenceError> {
        log::info!("Loading ONNX model from: {:?}", model_path);

        if !model_path.exists() {
            return Err(InferenceError(format!("Model not found: {:?}", model_path)));
        }
        if options.input_size == 0 {
            return Err(InferenceError("input_size must be > 0".to_string()));
        }

        let mut loaded = Vec::with_capacity(sessions.max(1));
        for _ in 0..sessions.max(1) {
            loaded.push(build_session(model_path)?);
        }

        let output_name = loaded[0].outputs.first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError("No output defined".to_string()))?;

        log::info!(
            "ONNX model loaded successfully ({} sessions, output '{}', {} labels)",
            loaded.len(), output_name, labels.len()
        );

        Ok(Self {
            sessions: loaded.into_iter().map(Mutex::new).collect(),
            output_name,
            labels,
            options,
        })
    }

    fn to_observations(&self, scores: &[f32]) -> Vec<Observation> {
        let probs = if self.options.apply_softmax {
            softmax(scores)
        } else {
            scores.to_vec()
        };

        probs.into_iter()
            .enumerate()
            .map(|(i, p)| Observation::new(self.labels.get(i), p.clamp(0.0, 1.0)))
            .collect()
    }
}

impl ImageClassifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn classify(&self, frame: &Frame, request: &mut VisionRequest) -> Result<Vec<Observation>, InferenceError> {
        if let Some(k) = request.intrinsics {
            log::trace!("Frame {} intrinsics fx={} fy={} cx={} cy={}", frame.id, k.0[0][0], k.0[1][1], k.0[0][2], k.0[1][2]);
        }

        let size = self.options.input_size;
        fill_input(frame, size, request.crop_and_scale, &self.options.normalization, &mut request.input)?;

        let input_array = to_array(&request.input, size)?;
        let input_tensor = Value::from_array(input_array)
            .map_err(|e| InferenceError(format!("Tensor error: {}", e)))?;

        let mut session = self.sessions[request.slot % self.sessions.len()].lock();

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError(format!("Inference failed: {}", e)))?;

        let output = outputs.get(&self.output_name)
            .ok_or_else(|| InferenceError("No output".to_string()))?;

        let output_tensor = output.try_extract_tensor::<f32>()
            .map_err(|e| InferenceError(format!("Extract error: {}", e)))?;

        let data = output_tensor.1;
        Ok(self.to_observations(data))
    }
}

/// Numerically stable softmax
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return vec![0.0; scores.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax() {
        let p = softmax(&[1.0, 1.0]);
        assert!((p[0] - 0.5).abs() < 1e-6);

        let p = softmax(&[10.0, 0.0, -10.0]);
        assert!(p[0] > 0.99);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-5);

        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_load_missing_model() {
        let result = OnnxClassifier::load(
            Path::new("/nonexistent/model.onnx"),
            Labels::default(),
            OnnxOptions::default(),
            2,
        );
        assert!(result.is_err());
    }
}
