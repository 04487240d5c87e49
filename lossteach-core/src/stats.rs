//! Aggregate size statistics over accepted fragments

use serde::{Deserialize, Serialize};

/// Number of histogram edges; there is one bin fewer.
pub const HISTOGRAM_EDGES: usize = 10;

/// Percentiles reported in the size table.
pub const TABLE_PERCENTILES: [u8; 10] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeDistribution {
    /// Bin edges, `linspace(0, max_size)`
    pub bins: Vec<f64>,
    pub counts: Vec<u64>,
}

/// Summary of fragment sizes in centimeters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeMetrics {
    pub min_size: f64,
    pub max_size: f64,
    pub mean_size: f64,
    pub median_size: f64,
    pub std_size: f64,
    pub size_distribution: SizeDistribution,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileRow {
    pub percentile: u8,
    pub size_cm: f64,
}

/// Cumulative distribution summary with the D10/D50/D90 passing sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CdfSummary {
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub d10: f64,
    pub d50: f64,
    pub d90: f64,
}

/// Compute size statistics. Empty input yields zeros and empty arrays.
pub fn analyze_fragment_sizes(sizes: &[f64]) -> SizeMetrics {
    if sizes.is_empty() {
        return SizeMetrics::default();
    }

    let sorted = sorted(sizes);
    let n = sorted.len() as f64;
    let min_size = sorted[0];
    let max_size = sorted[sorted.len() - 1];
    let mean_size = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|s| (s - mean_size).powi(2)).sum::<f64>() / n;

    let bins = linspace(0.0, max_size, HISTOGRAM_EDGES);
    let counts = histogram(&sorted, &bins);

    SizeMetrics {
        min_size,
        max_size,
        mean_size,
        median_size: percentile(&sorted, 50.0),
        std_size: variance.sqrt(),
        size_distribution: SizeDistribution { bins, counts },
    }
}

/// Linearly interpolated percentile of sorted data, `p` in [0, 100].
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

pub fn percentile_table(sizes: &[f64]) -> Vec<PercentileRow> {
    if sizes.is_empty() {
        return Vec::new();
    }
    let sorted = sorted(sizes);
    TABLE_PERCENTILES
        .iter()
        .map(|&p| PercentileRow {
            percentile: p,
            size_cm: percentile(&sorted, f64::from(p)),
        })
        .collect()
}

pub fn cdf_summary(sizes: &[f64]) -> Option<CdfSummary> {
    if sizes.is_empty() {
        return None;
    }
    let sorted = sorted(sizes);
    Some(CdfSummary {
        count: sorted.len(),
        min: sorted[0],
        mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
        max: sorted[sorted.len() - 1],
        d10: percentile(&sorted, 10.0),
        d50: percentile(&sorted, 50.0),
        d90: percentile(&sorted, 90.0),
    })
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Count values per bin. Bins are half-open except the last, which also
/// takes the upper edge. Degenerate edges put everything in the first bin.
fn histogram(values: &[f64], edges: &[f64]) -> Vec<u64> {
    let bins = edges.len().saturating_sub(1);
    let mut counts = vec![0u64; bins];
    if bins == 0 {
        return counts;
    }

    let lower = edges[0];
    let upper = edges[edges.len() - 1];
    for &value in values {
        if upper <= lower {
            if value == lower {
                counts[0] += 1;
            }
            continue;
        }
        if value < lower || value > upper {
            continue;
        }
        let index = edges.partition_point(|&edge| edge <= value).saturating_sub(1);
        counts[index.min(bins - 1)] += 1;
    }
    counts
}
