// Configuration for the fragment analysis pipeline

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Model frame as (height, width)
pub const DEFAULT_FRAME_SIZE: (usize, usize) = (512, 512);
pub const DEFAULT_CONVERSION_RATE: f64 = 0.003;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Frames larger than this are rejected so pixel coordinates fit in `i32`.
pub const MAX_FRAME_DIM: usize = 8192;

/// Analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Frame the model sees, (height, width)
    pub frame_size: (usize, usize),
    /// Centimeters per pixel of bounding-box area. This is a calibration
    /// constant for one camera and lens setup; recalibrate when either changes.
    pub conversion_rate: f64,
    /// Probability above which a mask pixel is foreground
    pub mask_threshold: f32,
    /// Default minimum score when a request does not set one
    pub score_threshold: f32,
    /// Wall-clock budget for one request, in seconds
    pub timeout_secs: u64,
    /// Process surviving instances on the rayon pool
    pub parallel_instances: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            conversion_rate: DEFAULT_CONVERSION_RATE,
            mask_threshold: DEFAULT_MASK_THRESHOLD,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            parallel_instances: false,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn frame_height(&self) -> usize {
        self.frame_size.0
    }

    pub fn frame_width(&self) -> usize {
        self.frame_size.1
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (height, width) = self.frame_size;
        if height == 0 || width == 0 {
            return Err(ConfigError::ValidationError(
                "frame_size dimensions must be > 0".to_string(),
            ));
        }
        if height > MAX_FRAME_DIM || width > MAX_FRAME_DIM {
            return Err(ConfigError::ValidationError(format!(
                "frame_size dimensions must be <= {}",
                MAX_FRAME_DIM
            )));
        }

        if !self.conversion_rate.is_finite() || self.conversion_rate <= 0.0 {
            return Err(ConfigError::ValidationError(
                "conversion_rate must be a positive finite number".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.mask_threshold) {
            return Err(ConfigError::ValidationError(
                "mask_threshold must be in [0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(ConfigError::ValidationError(
                "score_threshold must be in [0, 1]".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a configuration document, trying JSON, then TOML, then YAML.
pub fn parse_config<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    if let Ok(config) = serde_json::from_str::<T>(content) {
        return Ok(config);
    }

    if let Ok(config) = toml::from_str::<T>(content) {
        return Ok(config);
    }

    if let Ok(config) = serde_yaml::from_str::<T>(content) {
        return Ok(config);
    }

    Err(ConfigError::ParseError("Unknown format".to_string()))
}

/// Load a configuration file. The extension picks the parser when it is
/// recognised; otherwise the content is sniffed like [`parse_config`].
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => {
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        Some("toml") => {
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        _ => parse_config(&content),
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_size, (512, 512));
        assert_eq!(config.conversion_rate, 0.003);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AnalysisConfig::default();
        config.conversion_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.frame_size = (0, 512);
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.score_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml_fills_defaults() {
        let config: AnalysisConfig = parse_config("conversion_rate = 0.004\n").unwrap();
        assert_eq!(config.conversion_rate, 0.004);
        assert_eq!(config.frame_size, DEFAULT_FRAME_SIZE);
    }

    #[test]
    fn test_parse_json_and_yaml() {
        let json: AnalysisConfig = parse_config(r#"{"parallel_instances": true}"#).unwrap();
        assert!(json.parallel_instances);

        let yaml: AnalysisConfig = parse_config("timeout_secs: 5\nscore_threshold: 0.6\n").unwrap();
        assert_eq!(yaml.timeout_secs, 5);
        assert_eq!(yaml.score_threshold, 0.6);
    }

    #[test]
    fn test_load_config_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "frame_size: [256, 320]").unwrap();
        let config: AnalysisConfig = load_config(file.path()).unwrap();
        assert_eq!(config.frame_size, (256, 320));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result: Result<AnalysisConfig, _> = load_config("/nonexistent/lossteach.toml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
