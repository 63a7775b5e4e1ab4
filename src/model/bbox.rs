//! Normalized YOLO bounding boxes.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in normalized center format
/// (`center_x`, `center_y`, `width`, `height`).
///
/// Values are expected in `[0, 1]` relative to the image size, but the type
/// neither clamps nor validates them: labels are stored exactly as written.
/// Serializes as a four-element array, matching the `bbox_xywhn` document field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBoxXYWHN {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl BBoxXYWHN {
    /// Creates a box from center coordinates and size.
    #[inline]
    pub fn new(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self { cx, cy, w, h }
    }

    /// Returns the box as `[cx, cy, w, h]`.
    #[inline]
    pub fn to_array(self) -> [f64; 4] {
        [self.cx, self.cy, self.w, self.h]
    }
}

impl From<[f64; 4]> for BBoxXYWHN {
    fn from([cx, cy, w, h]: [f64; 4]) -> Self {
        Self::new(cx, cy, w, h)
    }
}

impl From<BBoxXYWHN> for [f64; 4] {
    fn from(bbox: BBoxXYWHN) -> Self {
        bbox.to_array()
    }
}
