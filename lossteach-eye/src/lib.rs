//! lossteach-eye: image intake and model inference for fragment analysis
//!
//! Decodes uploaded images into model tensors, runs the ONNX segmentation
//! model behind the core `InferenceBackend` trait and drives one request
//! through the analysis pipeline.

pub mod config;
pub mod error;
pub mod models;
pub mod preprocess;
pub mod service;

pub use config::VisionConfig;
pub use error::VisionError;
pub use models::OnnxSegmenter;
pub use service::FragmentService;
