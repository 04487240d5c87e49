//! Domain and wire types for detected fragments

use crate::codec::Rle;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// 2-D grid of exactly 0 or 1.
pub type BinaryMask = Array2<u8>;

/// Axis-aligned box in frame pixel coordinates.
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Truncate raw model coordinates toward zero and clamp them into a
    /// `(height, width)` frame. Out-of-frame boxes are clamped, never rejected.
    pub fn from_raw(raw: [f32; 4], frame: (usize, usize)) -> Self {
        let (height, width) = frame;
        // NaN truncates to 0
        let clamp = |value: f32, dim: usize| -> i32 {
            let max = i32::try_from(dim.saturating_sub(1)).unwrap_or(i32::MAX);
            (value as i32).clamp(0, max)
        };
        Self {
            x1: clamp(raw[0], width),
            y1: clamp(raw[1], height),
            x2: clamp(raw[2], width),
            y2: clamp(raw[3], height),
        }
    }

    /// Horizontal extent, 0 for inverted boxes
    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    /// Vertical extent, 0 for inverted boxes
    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(coords: [i32; 4]) -> Self {
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x1, bbox.y1, bbox.x2, bbox.y2]
    }
}

/// Shape descriptors of the largest external contour of a mask.
/// All fields are zero when no contour was found.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FragmentMetrics {
    pub area: f64,
    pub perimeter: f64,
    pub circularity: f64,
    pub contour_count: u32,
}

/// Run-length encoded mask cropped to its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskData {
    pub rle: Rle,
    pub bbox: BoundingBox,
    /// `[height, width]` of the cropped region
    pub shape: [usize; 2],
}

/// One detected fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: usize,
    pub bbox: BoundingBox,
    pub score: f32,
    pub size_cm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_data: Option<MaskData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<FragmentMetrics>,
}
