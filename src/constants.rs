//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Environment variables override the values loaded from the config file.

use std::path::PathBuf;

/// Default number of classifications allowed in flight
pub const DEFAULT_MAX_IN_FLIGHT: usize = 2;

/// Number of labels rendered on the results label
pub const DEFAULT_TOP_K: usize = 3;

/// Model input edge (pixels), square
pub const DEFAULT_INPUT_SIZE: usize = 224;

/// Synthetic camera frame rate
pub const DEFAULT_CAMERA_FPS: u32 = 30;

/// Text shown when the model returns no observations
pub const NOTHING_FOUND: &str = "nothing found";

/// Config file name inside the app config dir
pub const CONFIG_FILE_NAME: &str = "config.json";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "detect-animal";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Config file path from `DETECT_CONFIG`, else `<config_dir>/detect-animal/config.json`
pub fn get_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("DETECT_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
}

/// Max in-flight override
pub fn get_max_in_flight() -> Option<usize> {
    std::env::var("DETECT_MAX_IN_FLIGHT")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Model path override
pub fn get_model_path() -> Option<PathBuf> {
    std::env::var("DETECT_MODEL_PATH").ok().map(PathBuf::from)
}

/// Labels path override
pub fn get_labels_path() -> Option<PathBuf> {
    std::env::var("DETECT_LABELS_PATH").ok().map(PathBuf::from)
}

/// Run duration override (seconds, 0 = until the camera stream ends)
pub fn get_run_secs() -> Option<u64> {
    std::env::var("DETECT_RUN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
}
