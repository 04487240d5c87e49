//! Run-length mask codec
//!
//! Masks are flattened row-major and every maximal run of foreground pixels
//! becomes one `[start, length]` pair. Decoding is total: pairs that fall
//! outside the mask are skipped, overlong runs are cut at the end of the mask.
//! Shapes beyond `MAX_FRAME_DIM` on either side decode to an empty mask.

use crate::config::MAX_FRAME_DIM;
use crate::types::{BinaryMask, BoundingBox};
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Ordered `[start, length]` runs of ones over a row-major flattened mask.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rle(pub Vec<[i64; 2]>);

impl Rle {
    pub fn runs(&self) -> &[[i64; 2]] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of foreground pixels claimed by well-formed runs
    pub fn foreground_pixels(&self) -> u64 {
        self.0
            .iter()
            .filter(|[start, length]| *start >= 0 && *length > 0)
            .map(|[_, length]| *length as u64)
            .sum()
    }
}

impl From<Vec<[i64; 2]>> for Rle {
    fn from(runs: Vec<[i64; 2]>) -> Self {
        Rle(runs)
    }
}

/// Encode a binary mask. Any non-zero value counts as foreground.
pub fn encode(mask: ArrayView2<'_, u8>) -> Rle {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;

    for (index, &value) in mask.iter().enumerate() {
        match (value != 0, run_start) {
            (true, None) => run_start = Some(index),
            (false, Some(start)) => {
                runs.push([start as i64, (index - start) as i64]);
                run_start = None;
            }
            _ => {}
        }
    }

    if let Some(start) = run_start {
        runs.push([start as i64, (mask.len() - start) as i64]);
    }

    Rle(runs)
}

/// Decode runs into a `(height, width)` mask.
pub fn decode(rle: &Rle, shape: (usize, usize)) -> BinaryMask {
    let (height, width) = shape;
    if height > MAX_FRAME_DIM || width > MAX_FRAME_DIM {
        warn!("Refusing to decode a mask of shape {:?}", shape);
        return Array2::zeros((0, 0));
    }
    let total = height * width;
    let mut flat = vec![0u8; total];
    let mut skipped = 0usize;

    for &[start, length] in rle.runs() {
        let start = match usize::try_from(start) {
            Ok(start) if start < total && length > 0 => start,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let length = usize::try_from(length).unwrap_or(usize::MAX);
        let end = start.saturating_add(length).min(total);
        flat[start..end].fill(1);
    }

    if skipped > 0 {
        debug!("Skipped {} malformed run-length pairs for shape {:?}", skipped, shape);
    }

    Array2::from_shape_vec((height, width), flat)
        .unwrap_or_else(|_| Array2::zeros((height, width)))
}

/// Cut the `[y1..y2, x1..x2]` region out of a mask, clipped to its extent.
/// Inverted or fully outside boxes give an empty mask.
pub fn crop(mask: ArrayView2<'_, u8>, bbox: &BoundingBox) -> BinaryMask {
    let (rows, cols) = mask.dim();
    let clip = |value: i32, limit: usize| -> usize { (value.max(0) as usize).min(limit) };

    let y1 = clip(bbox.y1, rows);
    let y2 = clip(bbox.y2, rows).max(y1);
    let x1 = clip(bbox.x1, cols);
    let x2 = clip(bbox.x2, cols).max(x1);

    mask.slice(s![y1..y2, x1..x2]).to_owned()
}

/// Write a cropped mask back into a full frame at the box origin.
/// Whatever falls outside the frame is dropped.
pub fn paste(frame: &mut BinaryMask, cropped: ArrayView2<'_, u8>, bbox: &BoundingBox) {
    let (rows, cols) = frame.dim();
    let y1 = bbox.y1.max(0) as usize;
    let x1 = bbox.x1.max(0) as usize;
    if y1 >= rows || x1 >= cols {
        return;
    }

    let (crop_rows, crop_cols) = cropped.dim();
    let h = crop_rows.min(rows - y1);
    let w = crop_cols.min(cols - x1);
    if h == 0 || w == 0 {
        return;
    }

    frame
        .slice_mut(s![y1..y1 + h, x1..x1 + w])
        .assign(&cropped.slice(s![..h, ..w]));
}
