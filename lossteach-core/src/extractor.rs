//! Turn raw model outputs into fragment records

use crate::backend::RawDetections;
use crate::codec::{crop, encode};
use crate::config::{AnalysisConfig, DEFAULT_SCORE_THRESHOLD};
use crate::deadline::{Deadline, Stage};
use crate::error::{AnalysisError, Result};
use crate::geometry::{binarize, binary_mask_metrics, calculate_size, conversion_func, normalize};
use crate::response::{assemble, PredictionResponse};
use crate::types::{BoundingBox, Fragment, MaskData};
use ndarray::{ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Per-request extraction options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    pub score_threshold: f32,
    pub include_mask: bool,
    pub include_metrics: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            include_mask: false,
            include_metrics: false,
        }
    }
}

impl ExtractOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(AnalysisError::InputValidation(format!(
                "score_threshold must be in [0, 1], got {}",
                self.score_threshold
            )));
        }
        Ok(())
    }
}

/// Indices of detections whose score strictly exceeds the threshold, in order.
pub fn select_indices(scores: ArrayView1<'_, f32>, threshold: f32) -> Vec<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|&(_, &score)| score > threshold)
        .map(|(index, _)| index)
        .collect()
}

/// Fragment extractor
pub struct FragmentExtractor {
    config: AnalysisConfig,
}

impl FragmentExtractor {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Extract fragments and aggregate their sizes into a response.
    pub fn analyze(
        &self,
        raw: &RawDetections,
        options: &ExtractOptions,
        deadline: &Deadline,
    ) -> Result<PredictionResponse> {
        let fragments = self.extract(raw, options, deadline)?;
        Ok(assemble(fragments))
    }

    /// Threshold detections and build one record per survivor.
    /// Ids follow surviving order whether or not instances run in parallel.
    pub fn extract(
        &self,
        raw: &RawDetections,
        options: &ExtractOptions,
        deadline: &Deadline,
    ) -> Result<Vec<Fragment>> {
        raw.validate()?;
        options.validate()?;

        let selected = select_indices(raw.scores.view(), options.score_threshold);
        if selected.is_empty() {
            info!(
                "No fragments above score threshold {} ({} candidates)",
                options.score_threshold,
                raw.len()
            );
            return Ok(Vec::new());
        }

        debug!(
            "{} of {} detections above threshold {}",
            selected.len(),
            raw.len(),
            options.score_threshold
        );

        if self.config.parallel_instances {
            selected
                .par_iter()
                .enumerate()
                .map(|(id, &index)| self.build_fragment(id, index, raw, options, deadline))
                .collect()
        } else {
            selected
                .iter()
                .enumerate()
                .map(|(id, &index)| self.build_fragment(id, index, raw, options, deadline))
                .collect()
        }
    }

    fn build_fragment(
        &self,
        id: usize,
        index: usize,
        raw: &RawDetections,
        options: &ExtractOptions,
        deadline: &Deadline,
    ) -> Result<Fragment> {
        deadline.check(Stage::MaskProcessing)?;

        let frame = self.config.frame_size;
        let row = raw.boxes.row(index);
        let bbox = BoundingBox::from_raw([row[0], row[1], row[2], row[3]], frame);

        let probabilities = normalize(raw.masks.index_axis(Axis(0), index), frame);
        let binary = binarize(probabilities.view(), self.config.mask_threshold);

        let size_cm = conversion_func(calculate_size(&bbox), self.config.conversion_rate);

        let metrics = options
            .include_metrics
            .then(|| binary_mask_metrics(binary.view()));

        let mask_data = options.include_mask.then(|| {
            let cropped = crop(binary.view(), &bbox);
            MaskData {
                rle: encode(cropped.view()),
                bbox,
                shape: [cropped.nrows(), cropped.ncols()],
            }
        });

        Ok(Fragment {
            id,
            bbox,
            score: raw.scores[index],
            size_cm,
            mask_data,
            metrics,
        })
    }
}
