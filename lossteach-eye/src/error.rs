//! Error types for lossteach-eye

use lossteach_core::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),
}

impl From<VisionError> for AnalysisError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Model(msg) | VisionError::Ort(msg) => AnalysisError::Infrastructure(msg),
            VisionError::Processing(msg) => AnalysisError::InputValidation(msg),
            VisionError::Config(msg) => AnalysisError::Config(msg),
            VisionError::Io(e) => AnalysisError::Io(e),
            VisionError::Image(e) => AnalysisError::Image(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::Model("missing output".to_string());
        assert!(err.to_string().contains("Model error"));
        assert!(err.to_string().contains("missing output"));
    }

    #[test]
    fn test_vision_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vision_err: VisionError = io_err.into();
        assert!(matches!(vision_err, VisionError::Io(_)));
    }

    #[test]
    fn test_vision_error_to_analysis_error() {
        let err: AnalysisError = VisionError::Ort("session poisoned".to_string()).into();
        assert!(matches!(err, AnalysisError::Infrastructure(_)));

        let err: AnalysisError = VisionError::Processing("bad shape".to_string()).into();
        assert!(matches!(err, AnalysisError::InputValidation(_)));
    }
}
