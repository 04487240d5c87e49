//! Segmentation model backends

pub mod segmenter;

pub use segmenter::{detections_from_outputs, OnnxSegmenter};
