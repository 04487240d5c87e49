//! One prediction request end to end

use crate::config::VisionConfig;
use crate::preprocess::{image_to_tensor, load_image};
use lossteach_core::{
    AnalysisConfig, AnalysisError, Deadline, ExtractOptions, FragmentExtractor, InferenceBackend,
    PredictionResponse, Result, Stage,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Runs uploads through preprocessing, inference and analysis.
///
/// The backend is injected so tests and alternative runtimes can stand in
/// for the ONNX model.
pub struct FragmentService {
    backend: Arc<dyn InferenceBackend>,
    extractor: FragmentExtractor,
    vision: VisionConfig,
}

impl FragmentService {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        analysis: AnalysisConfig,
        vision: VisionConfig,
    ) -> Self {
        Self {
            backend,
            extractor: FragmentExtractor::new(analysis),
            vision,
        }
    }

    pub fn analysis_config(&self) -> &AnalysisConfig {
        self.extractor.config()
    }

    pub fn vision_config(&self) -> &VisionConfig {
        &self.vision
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_ready()
    }

    pub fn model_name(&self) -> &str {
        self.backend.name()
    }

    /// Options for a request, filling the configured default threshold.
    pub fn options(
        &self,
        score_threshold: Option<f32>,
        include_mask: bool,
        include_metrics: bool,
    ) -> ExtractOptions {
        ExtractOptions {
            score_threshold: score_threshold.unwrap_or(self.analysis_config().score_threshold),
            include_mask,
            include_metrics,
        }
    }

    /// Analyze an uploaded image. The upload is staged in a temporary file
    /// that is removed on every exit path.
    pub fn predict_bytes(
        &self,
        bytes: &[u8],
        options: &ExtractOptions,
    ) -> Result<PredictionResponse> {
        let deadline = Deadline::start(self.analysis_config().timeout());
        options.validate()?;

        if bytes.is_empty() {
            return Err(AnalysisError::InputValidation("Uploaded file is empty".to_string()));
        }
        if bytes.len() > self.vision.max_upload_bytes {
            return Err(AnalysisError::InputValidation(format!(
                "Upload of {} bytes exceeds limit of {} bytes",
                bytes.len(),
                self.vision.max_upload_bytes
            )));
        }
        if !self.backend.is_ready() {
            return Err(AnalysisError::Infrastructure(format!(
                "Model {} is not ready",
                self.backend.name()
            )));
        }

        let staged = stage_upload(bytes)?;
        debug!("Staged {} bytes at {:?}", bytes.len(), staged.path());

        let image = load_image(staged.path()).map_err(|e| {
            AnalysisError::InputValidation(format!("Could not decode uploaded image: {}", e))
        })?;
        let tensor = image_to_tensor(
            &image,
            self.analysis_config().frame_size,
            self.vision.resize_input,
        )?;
        deadline.check(Stage::Preprocess)?;

        let raw = self.backend.infer(&tensor)?;
        deadline.check(Stage::Inference)?;
        debug!("Model returned {} candidate detections", raw.len());

        let response = self.extractor.analyze(&raw, options, &deadline)?;
        info!(
            "Detected {} fragments above threshold {} in {:?}",
            response.fragment_count(),
            options.score_threshold,
            deadline.elapsed()
        );
        Ok(response)
    }
}

fn stage_upload(bytes: &[u8]) -> Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new().prefix("lossteach-upload-").tempfile()?;
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}
