//! Error types for lossteach-core

use crate::deadline::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Timed out during {stage} after {elapsed_ms} ms")]
    Timeout { stage: Stage, elapsed_ms: u64 },

    #[error("Inference backend error: {0}")]
    Infrastructure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    /// Stable machine-readable code for the wire error body.
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InputValidation(_) | AnalysisError::Image(_) => "INVALID_INPUT",
            AnalysisError::Timeout { .. } => "TIMEOUT",
            AnalysisError::Infrastructure(_) => "MODEL_UNAVAILABLE",
            AnalysisError::Io(_) | AnalysisError::Config(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<crate::config::ConfigError> for AnalysisError {
    fn from(err: crate::config::ConfigError) -> Self {
        AnalysisError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AnalysisError::InputValidation("x".into()).code(), "INVALID_INPUT");
        assert_eq!(
            AnalysisError::Timeout { stage: Stage::Inference, elapsed_ms: 31_000 }.code(),
            "TIMEOUT"
        );
        assert_eq!(AnalysisError::Infrastructure("down".into()).code(), "MODEL_UNAVAILABLE");
        assert_eq!(AnalysisError::Config("bad".into()).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_timeout_display_names_stage() {
        let err = AnalysisError::Timeout { stage: Stage::MaskProcessing, elapsed_ms: 42 };
        assert_eq!(err.to_string(), "Timed out during mask processing after 42 ms");
    }
}
