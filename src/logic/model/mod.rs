//! Model Module - Image classification backends
//!
//! Tách logic inference khỏi capture & pipeline.
//! Dễ dàng swap model: ONNX nếu có, fallback heuristics nếu không.

pub mod inference;
pub mod preprocess;
pub mod labels;
pub mod guard;
pub mod onnx;
pub mod fallback;

use std::sync::Arc;

// Re-export common types
pub use inference::{rank, ImageClassifier, Observation, VisionRequest};
pub use preprocess::CropAndScale;
pub use labels::Labels;
pub use onnx::{OnnxClassifier, OnnxOptions};
pub use fallback::ColorClassifier;

use crate::logic::config::ModelConfig;

/// Build the configured backend: ONNX when a model loads, fallback otherwise.
///
/// `sessions` should equal the number of request slots.
pub fn load_classifier(config: &ModelConfig, sessions: usize) -> Arc<dyn ImageClassifier> {
    let Some(model_path) = config.path.as_deref() else {
        log::info!("No model configured - using fallback heuristics");
        return Arc::new(ColorClassifier::new());
    };

    if let Some(expected) = config.sha256.as_deref() {
        if let Err(e) = guard::verify_checksum(model_path, expected) {
            log::warn!("{} - using fallback heuristics", e);
            return Arc::new(ColorClassifier::new());
        }
    }

    let labels = match config.labels_path.as_deref() {
        Some(path) => Labels::load(path).unwrap_or_else(|e| {
            log::warn!("{} - labels will be class indices", e);
            Labels::default()
        }),
        None => Labels::default(),
    };

    match OnnxClassifier::load(model_path, labels, config.onnx.clone(), sessions) {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            log::warn!("{} - using fallback heuristics", e);
            Arc::new(ColorClassifier::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_no_model_uses_fallback() {
        let classifier = load_classifier(&ModelConfig::default(), 2);
        assert_eq!(classifier.name(), "fallback");
    }

    #[test]
    fn test_missing_model_uses_fallback() {
        let config = ModelConfig {
            path: Some(PathBuf::from("/nonexistent/model.onnx")),
            ..Default::default()
        };
        assert_eq!(load_classifier(&config, 2).name(), "fallback");
    }

    #[test]
    fn test_checksum_mismatch_uses_fallback() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = ModelConfig {
            path: Some(file.path().to_path_buf()),
            sha256: Some("deadbeef".to_string()),
            ..Default::default()
        };
        assert_eq!(load_classifier(&config, 1).name(), "fallback");
    }
}
