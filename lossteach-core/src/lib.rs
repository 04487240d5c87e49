pub mod types;
pub mod error;
pub mod config;
pub mod deadline;
pub mod codec;
pub mod geometry;
pub mod stats;
pub mod backend;
pub mod extractor;
pub mod response;

pub use error::{AnalysisError, Result};
pub use config::{AnalysisConfig, ConfigError};
pub use deadline::{Deadline, Stage};
pub use types::{BinaryMask, BoundingBox, Fragment, FragmentMetrics, MaskData};
pub use codec::Rle;
pub use geometry::MetricsError;
pub use stats::{CdfSummary, PercentileRow, SizeDistribution, SizeMetrics};
pub use backend::{InferenceBackend, RawDetections};
pub use extractor::{ExtractOptions, FragmentExtractor};
pub use response::{assemble, LegacyPredictionResponse, PredictionResponse};
