// THEORY:
// The `smart_blob` module holds the plain data produced by the spatial layer.
// A blob is one 8-connected region of a binary mask, summarized by its bounding
// box and pixel count. These are "dumb" containers: they are created fresh for
// every frame, carry no history, and are thrown away once the frame's detection
// has been reported.

use serde::{Deserialize, Serialize};

/// The smallest axis-aligned rectangle containing a region, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }
}

/// Per-component statistics of one labeled region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStats {
    /// Label of the region. 0 is the background and never appears here.
    pub label: u32,
    pub bounding_box: BoundingBox,
    /// Number of pixels in the region. Always at least 1.
    pub area: usize,
}

/// The result for one frame: the bounding box of the largest matching region,
/// or `None` when nothing in the frame matches.
pub type Detection = Option<BoundingBox>;
