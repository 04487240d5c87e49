//! Response body assembly

use crate::stats::{analyze_fragment_sizes, SizeMetrics};
use crate::types::Fragment;
use serde::{Deserialize, Serialize};

/// Body of a successful prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub fragments: Vec<Fragment>,
    pub size_metrics: SizeMetrics,
}

impl PredictionResponse {
    /// Zero detections: no fragments and all-zero statistics
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Fragment sizes in id order
    pub fn sizes(&self) -> Vec<f64> {
        self.fragments.iter().map(|f| f.size_cm).collect()
    }
}

/// Combine fragment records with the statistics over their sizes.
pub fn assemble(fragments: Vec<Fragment>) -> PredictionResponse {
    let sizes: Vec<f64> = fragments.iter().map(|f| f.size_cm).collect();
    let size_metrics = analyze_fragment_sizes(&sizes);
    PredictionResponse {
        fragments,
        size_metrics,
    }
}

/// Older wire shape: statistics as a one-element list under a misspelt key.
/// Only produced on explicit conversion for clients that still expect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPredictionResponse {
    pub fragments: Vec<Fragment>,
    pub size_mectrics: Vec<SizeMetrics>,
}

impl From<PredictionResponse> for LegacyPredictionResponse {
    fn from(response: PredictionResponse) -> Self {
        Self {
            fragments: response.fragments,
            size_mectrics: vec![response.size_metrics],
        }
    }
}

impl From<LegacyPredictionResponse> for PredictionResponse {
    fn from(legacy: LegacyPredictionResponse) -> Self {
        Self {
            fragments: legacy.fragments,
            size_metrics: legacy.size_mectrics.into_iter().next().unwrap_or_default(),
        }
    }
}
