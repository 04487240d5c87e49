//! Configuration for lossteach-eye

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Model and image intake configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Path to the exported ONNX segmentation model
    pub model_path: PathBuf,
    /// Version string reported by health checks
    pub model_version: String,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
    /// Resize images that do not match the model frame instead of rejecting them
    pub resize_input: bool,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.onnx"),
            model_version: "1.0.0".to_string(),
            intra_threads: 4,
            resize_input: false,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl VisionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model_path.as_os_str().is_empty() {
            return Err("model_path must not be empty".to_string());
        }

        if self.intra_threads == 0 || self.intra_threads > 256 {
            return Err("intra_threads must be between 1 and 256".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = VisionConfig::default();
        assert_eq!(config.model_path, PathBuf::from("models/model.onnx"));
        assert_eq!(config.intra_threads, 4);
        assert!(!config.resize_input);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid() {
        let config = VisionConfig {
            intra_threads: 0,
            ..VisionConfig::default()
        };
        assert!(config.validate().is_err());

        let config = VisionConfig {
            model_path: PathBuf::new(),
            ..VisionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
