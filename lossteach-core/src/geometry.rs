//! Geometry and shape metrics for fragment masks

use crate::types::{BinaryMask, BoundingBox, FragmentMetrics};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;
use ndarray::{Array2, ArrayView2, ArrayViewD, Ix2};
use std::f64::consts::PI;
use thiserror::Error;
use tracing::warn;

/// Probability above which a mask pixel is foreground.
pub const MASK_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("mask of {rows}x{cols} cannot be rasterised")]
    Dimensions { rows: usize, cols: usize },
}

/// Pixel area of a box, `(x2 - x1) * (y2 - y1)`. Inverted boxes have area 0.
pub fn calculate_size(bbox: &BoundingBox) -> f64 {
    f64::from(bbox.width()) * f64::from(bbox.height())
}

/// Convert a pixel area to centimeters with a calibration rate.
pub fn conversion_func(pixel_area: f64, conversion_rate: f64) -> f64 {
    pixel_area * conversion_rate
}

/// Coerce a raw per-instance probability map into a `(height, width)` grid.
///
/// Scalars fill the frame, singleton axes are squeezed away, flat vectors of
/// `height * width` values are reshaped row-major. Anything else fills the
/// frame with its first value (0.0 when empty).
pub fn normalize(raw: ArrayViewD<'_, f32>, frame: (usize, usize)) -> Array2<f32> {
    let first = || raw.iter().next().copied().unwrap_or(0.0);

    match raw.ndim() {
        0 => Array2::from_elem(frame, first()),
        2 => match raw.view().into_dimensionality::<Ix2>() {
            Ok(grid) => grid.to_owned(),
            Err(_) => Array2::from_elem(frame, first()),
        },
        1 if raw.len() == frame.0 * frame.1 => match raw.to_shape(frame) {
            Ok(grid) => grid.into_owned(),
            Err(_) => Array2::from_elem(frame, first()),
        },
        n if n > 2 => {
            let squeezed: Vec<usize> = raw.shape().iter().copied().filter(|&d| d != 1).collect();
            if squeezed.len() == n {
                return Array2::from_elem(frame, first());
            }
            match raw.to_shape(squeezed.as_slice()) {
                Ok(view) => normalize(view.view(), frame),
                Err(_) => Array2::from_elem(frame, first()),
            }
        }
        _ => Array2::from_elem(frame, first()),
    }
}

/// Threshold probabilities into a 0/1 mask. NaN is background.
pub fn binarize(mask: ArrayView2<'_, f32>, threshold: f32) -> BinaryMask {
    mask.mapv(|value| u8::from(value > threshold))
}

/// Shape metrics of the largest external contour of a binary mask.
pub fn try_mask_metrics(mask: ArrayView2<'_, u8>) -> Result<FragmentMetrics, MetricsError> {
    let (rows, cols) = mask.dim();
    if rows == 0 || cols == 0 {
        return Ok(FragmentMetrics::default());
    }

    // One-pixel zero border so foreground touching the edge still traces.
    let dims_error = || MetricsError::Dimensions { rows, cols };
    let width = cols
        .checked_add(2)
        .and_then(|w| u32::try_from(w).ok())
        .ok_or_else(dims_error)?;
    let height = rows
        .checked_add(2)
        .and_then(|h| u32::try_from(h).ok())
        .ok_or_else(dims_error)?;
    let mut image = GrayImage::new(width, height);
    for ((row, col), &value) in mask.indexed_iter() {
        if value != 0 {
            image.put_pixel(col as u32 + 1, row as u32 + 1, Luma([255]));
        }
    }

    let contours: Vec<Contour<i32>> = find_contours::<i32>(&image)
        .into_iter()
        .map(|mut contour| {
            for point in &mut contour.points {
                point.x -= 1;
                point.y -= 1;
            }
            contour
        })
        .collect();
    let external: Vec<&Contour<i32>> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect();

    let mut largest: Option<(f64, &Contour<i32>)> = None;
    for &contour in &external {
        let area = polygon_area(&contour.points);
        // strict comparison keeps the first contour on ties
        if largest.map_or(true, |(best, _)| area > best) {
            largest = Some((area, contour));
        }
    }

    let Some((area, contour)) = largest else {
        return Ok(FragmentMetrics::default());
    };

    let perimeter = closed_arc_length(&contour.points);
    let circularity = if perimeter > 0.0 {
        4.0 * PI * area / (perimeter * perimeter)
    } else {
        0.0
    };

    Ok(FragmentMetrics {
        area,
        perimeter,
        circularity,
        contour_count: external.len() as u32,
    })
}

/// Metrics for an already binarized mask. Failures degrade to zeros.
pub fn binary_mask_metrics(mask: ArrayView2<'_, u8>) -> FragmentMetrics {
    match try_mask_metrics(mask) {
        Ok(metrics) => metrics,
        Err(e) => {
            warn!("Mask metrics unavailable, using zeros: {}", e);
            FragmentMetrics::default()
        }
    }
}

/// Normalize, binarize at [`MASK_THRESHOLD`] and measure a raw mask.
/// Never fails: degenerate input yields all-zero metrics.
pub fn calculate_mask_metrics(raw: ArrayViewD<'_, f32>, frame: (usize, usize)) -> FragmentMetrics {
    let probabilities = normalize(raw, frame);
    let binary = binarize(probabilities.view(), MASK_THRESHOLD);
    binary_mask_metrics(binary.view())
}

/// Shoelace area of the polygon through the contour points.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.abs() as f64 / 2.0
}

fn closed_arc_length(points: &[Point<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| f64::from(a.x - b.x).hypot(f64::from(a.y - b.y)))
        .sum()
}
