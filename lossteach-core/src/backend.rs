//! Inference backend abstraction

use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2, Array4, ArrayD, IxDyn};

/// Positional outputs of an instance-segmentation model.
#[derive(Debug, Clone)]
pub struct RawDetections {
    /// `[N, 4]` as x1, y1, x2, y2
    pub boxes: Array2<f32>,
    /// `[N]`
    pub scores: Array1<f32>,
    /// `[N, H, W]` or `[N, 1, H, W]` probabilities
    pub masks: ArrayD<f32>,
}

impl RawDetections {
    pub fn new(boxes: Array2<f32>, scores: Array1<f32>, masks: ArrayD<f32>) -> Self {
        Self { boxes, scores, masks }
    }

    /// No detections for a `(height, width)` frame
    pub fn empty(frame: (usize, usize)) -> Self {
        Self {
            boxes: Array2::zeros((0, 4)),
            scores: Array1::zeros(0),
            masks: ArrayD::zeros(IxDyn(&[0, frame.0, frame.1])),
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Check that boxes, scores and masks agree on the instance count.
    pub fn validate(&self) -> Result<()> {
        if self.boxes.ncols() != 4 {
            return Err(AnalysisError::InputValidation(format!(
                "boxes must have 4 columns, got shape {:?}",
                self.boxes.shape()
            )));
        }

        let n = self.scores.len();
        if self.boxes.nrows() != n {
            return Err(AnalysisError::InputValidation(format!(
                "{} boxes but {} scores",
                self.boxes.nrows(),
                n
            )));
        }

        let mask_count = self.masks.shape().first().copied().unwrap_or(0);
        if mask_count != n {
            return Err(AnalysisError::InputValidation(format!(
                "{} masks but {} scores",
                mask_count, n
            )));
        }

        Ok(())
    }
}

/// A model that turns a `[1, 3, H, W]` image tensor into detections.
pub trait InferenceBackend: Send + Sync {
    /// Model identifier reported by health checks
    fn name(&self) -> &str;

    fn is_ready(&self) -> bool;

    fn infer(&self, input: &Array4<f32>) -> Result<RawDetections>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_detections_are_valid() {
        let raw = RawDetections::empty((512, 512));
        assert!(raw.is_empty());
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_count_mismatch_is_rejected() {
        let raw = RawDetections::new(
            Array2::zeros((2, 4)),
            Array1::zeros(3),
            ArrayD::zeros(IxDyn(&[3, 8, 8])),
        );
        assert!(matches!(raw.validate(), Err(AnalysisError::InputValidation(_))));
    }

    #[test]
    fn test_bad_box_width_is_rejected() {
        let raw = RawDetections::new(
            Array2::zeros((1, 5)),
            Array1::zeros(1),
            ArrayD::zeros(IxDyn(&[1, 8, 8])),
        );
        assert!(raw.validate().is_err());
    }

    #[test]
    fn test_scalar_masks_are_rejected() {
        let raw = RawDetections::new(
            Array2::zeros((1, 4)),
            Array1::zeros(1),
            ArrayD::zeros(IxDyn(&[])),
        );
        assert!(raw.validate().is_err());
    }
}
