//! App Configuration
//!
//! Loaded from a JSON file, then overridden from environment variables.
//! Every field has a default so a partial (or missing) file is fine.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::capture::{Orientation, SessionPreset};
use crate::logic::model::{CropAndScale, OnnxOptions};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfigError: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// SECTIONS
// ============================================================================

/// Bounded-concurrency classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Max classifications in flight (K)
    pub max_in_flight: usize,
    pub crop_and_scale: CropAndScale,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_in_flight: constants::DEFAULT_MAX_IN_FLIGHT,
            crop_and_scale: CropAndScale::CenterCrop,
        }
    }
}

/// Model backend settings. No `path` -> fallback heuristics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModelConfig {
    pub path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    /// Expected SHA-256 of the model file
    pub sha256: Option<String>,
    pub onnx: OnnxOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub session_preset: SessionPreset,
    pub fps: u32,
    /// Deliver every n-th frame
    pub frame_interval: usize,
    /// Stop the synthetic camera after this many frames
    pub frame_limit: Option<u64>,
    /// Raw EXIF orientation hint (1..=8)
    pub orientation: u32,
    /// Attach pinhole intrinsics with this focal length (pixels)
    pub focal_length_px: Option<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            session_preset: SessionPreset::High,
            fps: constants::DEFAULT_CAMERA_FPS,
            frame_interval: 1,
            frame_limit: None,
            orientation: 1,
            focal_length_px: None,
        }
    }
}

impl CameraConfig {
    pub fn orientation(&self) -> Orientation {
        Orientation::from_raw_or_up(self.orientation)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub top_k: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            top_k: constants::DEFAULT_TOP_K,
        }
    }
}

// ============================================================================
// APP CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub model: ModelConfig,
    pub camera: CameraConfig,
    pub display: DisplayConfig,
    /// Seconds to run before shutting down; 0 = until the camera stream ends
    pub run_secs: u64,
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Missing file -> defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("Failed to read {:?}: {}", path, e)))?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Config file (if any) + environment overrides
    pub fn resolve() -> Result<Self, ConfigError> {
        let mut config = match constants::get_config_path() {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Some(k) = constants::get_max_in_flight() {
            self.classifier.max_in_flight = k;
        }
        if let Some(path) = constants::get_model_path() {
            self.model.path = Some(path);
        }
        if let Some(path) = constants::get_labels_path() {
            self.model.labels_path = Some(path);
        }
        if let Some(secs) = constants::get_run_secs() {
            self.run_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifier.max_in_flight == 0 {
            return Err(ConfigError("classifier.max_in_flight must be >= 1".to_string()));
        }
        if self.camera.frame_interval == 0 {
            return Err(ConfigError("camera.frame_interval must be >= 1".to_string()));
        }
        if self.camera.fps == 0 {
            return Err(ConfigError("camera.fps must be >= 1".to_string()));
        }
        if self.display.top_k == 0 {
            return Err(ConfigError("display.top_k must be >= 1".to_string()));
        }
        if self.model.onnx.input_size == 0 {
            return Err(ConfigError("model.onnx.input_size must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.classifier.max_in_flight, 2);
        assert_eq!(config.display.top_k, 3);
        assert_eq!(config.classifier.crop_and_scale, CropAndScale::CenterCrop);
        assert!(config.model.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = AppConfig::from_json(r#"{
            "classifier": { "max_in_flight": 4 },
            "camera": { "session_preset": "low", "orientation": 6 }
        }"#).unwrap();
        assert_eq!(config.classifier.max_in_flight, 4);
        assert_eq!(config.camera.session_preset, SessionPreset::Low);
        assert_eq!(config.camera.orientation(), Orientation::Right);
        assert_eq!(config.camera.fps, 30);
    }

    #[test]
    fn test_rejects_zero_in_flight() {
        assert!(AppConfig::from_json(r#"{ "classifier": { "max_in_flight": 0 } }"#).is_err());
        assert!(AppConfig::from_json(r#"{ "display": { "top_k": 0 } }"#).is_err());
        assert!(AppConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_load_file_and_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "run_secs": 5, "model": {{ "path": "/tmp/m.onnx" }} }}"#).unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.run_secs, 5);
        assert_eq!(config.model.path, Some(PathBuf::from("/tmp/m.onnx")));

        let missing = AppConfig::load(Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(missing.run_secs, 0);
    }
}
