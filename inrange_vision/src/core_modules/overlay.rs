// Annotation of host frames. Writes go straight into the caller's buffer through
// a `FrameMut`, which only exists for the duration of the call.

use crate::core_modules::frame::{FrameMut, Yuv, rgb_to_yuv};
use crate::core_modules::smart_blob::BoundingBox;

/// Draws a 1-pixel outline with corners at `(left, top)` and
/// `(left + width, top + height)`, both inclusive. Parts outside the frame are
/// clipped.
pub fn draw_rectangle(frame: &mut FrameMut<'_>, bbox: &BoundingBox, color: [u8; 3]) {
    let sample: Yuv = rgb_to_yuv(color[0], color[1], color[2]);
    let geometry = frame.geometry();
    let (max_x, max_y) = (geometry.width - 1, geometry.height - 1);

    let x0 = bbox.left;
    let y0 = bbox.top;
    let x1 = bbox.left.saturating_add(bbox.width);
    let y1 = bbox.top.saturating_add(bbox.height);
    if x0 > max_x || y0 > max_y {
        return;
    }

    for y in [y0, y1] {
        if y <= max_y {
            for x in x0..=x1.min(max_x) {
                frame.put_sample(x, y, sample);
            }
        }
    }
    for x in [x0, x1] {
        if x <= max_x {
            for y in y0..=y1.min(max_y) {
                frame.put_sample(x, y, sample);
            }
        }
    }
}
