//! ONNX instance-segmentation model

use crate::config::VisionConfig;
use crate::error::VisionError;
use lossteach_core::{AnalysisError, InferenceBackend, RawDetections};
use ndarray::{Array4, ArrayD, Ix1, Ix2, IxDyn};
use ort::session::Session;
use ort::value::{DynValue, TensorRef};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Segmentation model served through ONNX Runtime.
///
/// Outputs are read by position: boxes `[N, 4]`, scores `[N]`, masks
/// `[N, H, W]` or `[N, 1, H, W]`.
pub struct OnnxSegmenter {
    session: Mutex<Session>,
    name: String,
    model_path: PathBuf,
}

impl OnnxSegmenter {
    /// Load the model named by the configuration
    pub fn load(config: &VisionConfig) -> Result<Self, VisionError> {
        let model_path = config.model_path.clone();
        if !model_path.exists() {
            return Err(VisionError::Model(format!(
                "Model file not found: {:?}",
                model_path
            )));
        }

        let session = Session::builder()
            .map_err(|e| VisionError::Ort(format!("Failed to create session builder: {}", e)))?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| VisionError::Ort(format!("Failed to set intra threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| VisionError::Ort(format!("Failed to load segmentation model: {}", e)))?;

        info!("Segmentation model loaded from {:?}", model_path);

        let name = model_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("model")
            .to_string();

        Ok(Self {
            session: Mutex::new(session),
            name,
            model_path,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn run(&self, input: &Array4<f32>) -> Result<RawDetections, VisionError> {
        let tensor = TensorRef::from_array_view(input)
            .map_err(|e| VisionError::Ort(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| VisionError::Ort(format!("Segmentation inference failed: {}", e)))?;

        if outputs.len() < 3 {
            return Err(VisionError::Model(format!(
                "Expected boxes, scores and masks outputs, got {}",
                outputs.len()
            )));
        }

        let boxes = extract_output(&outputs[0], 0)?;
        let scores = extract_output(&outputs[1], 1)?;
        let masks = extract_output(&outputs[2], 2)?;
        drop(outputs);
        drop(session);

        detections_from_outputs(boxes, scores, masks)
    }
}

fn extract_output(value: &DynValue, index: usize) -> Result<(Vec<usize>, Vec<f32>), VisionError> {
    let (shape, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|e| VisionError::Ort(format!("Failed to extract output {}: {}", index, e)))?;
    let dims = shape
        .iter()
        .map(|&d| usize::try_from(d).unwrap_or(0))
        .collect();
    Ok((dims, data.to_vec()))
}

/// Build detections from flat `(shape, data)` output buffers.
pub fn detections_from_outputs(
    boxes: (Vec<usize>, Vec<f32>),
    scores: (Vec<usize>, Vec<f32>),
    masks: (Vec<usize>, Vec<f32>),
) -> Result<RawDetections, VisionError> {
    let to_array = |(dims, data): (Vec<usize>, Vec<f32>), label: &str| {
        ArrayD::from_shape_vec(IxDyn(&dims), data)
            .map_err(|e| VisionError::Model(format!("Malformed {} output: {}", label, e)))
    };

    let boxes = to_array(boxes, "boxes")?
        .into_dimensionality::<Ix2>()
        .map_err(|e| VisionError::Model(format!("boxes output must be 2-D: {}", e)))?;
    let scores = to_array(scores, "scores")?
        .into_dimensionality::<Ix1>()
        .map_err(|e| VisionError::Model(format!("scores output must be 1-D: {}", e)))?;
    let masks = to_array(masks, "masks")?;

    debug!(
        "Model outputs: boxes {:?}, scores {:?}, masks {:?}",
        boxes.shape(),
        scores.shape(),
        masks.shape()
    );

    Ok(RawDetections::new(boxes, scores, masks))
}

impl InferenceBackend for OnnxSegmenter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn infer(&self, input: &Array4<f32>) -> Result<RawDetections, AnalysisError> {
        self.run(input).map_err(AnalysisError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file() {
        let config = VisionConfig {
            model_path: PathBuf::from("/nonexistent/model.onnx"),
            ..VisionConfig::default()
        };
        assert!(matches!(OnnxSegmenter::load(&config), Err(VisionError::Model(_))));
    }

    #[test]
    fn test_detections_from_outputs() {
        let raw = detections_from_outputs(
            (vec![2, 4], vec![0.0, 0.0, 10.0, 10.0, 5.0, 5.0, 20.0, 20.0]),
            (vec![2], vec![0.9, 0.4]),
            (vec![2, 1, 2, 2], vec![0.0; 8]),
        )
        .unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.masks.shape(), &[2, 1, 2, 2]);
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_malformed_outputs_are_rejected() {
        let result = detections_from_outputs(
            (vec![2, 4], vec![0.0; 7]),
            (vec![2], vec![0.9, 0.4]),
            (vec![2, 2, 2], vec![0.0; 8]),
        );
        assert!(matches!(result, Err(VisionError::Model(_))));

        let result = detections_from_outputs(
            (vec![8], vec![0.0; 8]),
            (vec![2], vec![0.9, 0.4]),
            (vec![2, 2, 2], vec![0.0; 8]),
        );
        assert!(result.is_err());
    }
}
