// THEORY:
// The `segmenter` decides, pixel by pixel, which parts of the frame "look like"
// the target, and then cleans that raw decision into solid regions.
//
// Algorithm:
// 1.  **Dual Threshold**: The HSV image is tested against each of the two hue
//     intervals of the `HueBand`, with saturation and value bounded below by the
//     target's thresholds and unbounded above. All bounds are inclusive.
// 2.  **Union**: The two partial masks are OR-ed, so a band that wraps the 0/180
//     seam behaves exactly like one contiguous band.
// 3.  **Cleanup**: erode, dilate, dilate, erode with a 5x5 ellipse. The leading
//     erode/dilate pair is an opening that deletes specks smaller than the
//     element; the trailing dilate/erode pair is a closing that bridges small
//     gaps between fragments of one object and trims the boundary back. Changing
//     the order changes how much of each boundary survives.
//
// The segmenter has no failure mode. A frame with no qualifying pixel simply
// produces an all-zero mask.

use crate::core_modules::color_model::{HueBand, HueRange, TargetColor};
use crate::core_modules::frame::HsvImage;
use crate::core_modules::morphology::{self, MASK_OFF, MASK_ON, StructuringElement};
use image::{GrayImage, Luma};
use log::trace;

/// Side of the square box the cleanup ellipse is inscribed in.
pub const CLEANUP_KERNEL_SIZE: u32 = 5;

/// Marks pixels whose hue is in `hue` and whose saturation and value reach the
/// target's lower bounds.
pub fn threshold(hsv: &HsvImage, hue: HueRange, target: &TargetColor) -> GrayImage {
    let width = hsv.width() as usize;
    let pixels = hsv.pixels();
    GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| {
        let pixel = pixels[y as usize * width + x as usize];
        let on = hue.contains(pixel.hue) && target.admits_intensity(pixel);
        Luma([if on { MASK_ON } else { MASK_OFF }])
    })
}

/// Pixelwise OR of two masks of equal size.
pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y).0[0] | b.get_pixel(x, y).0[0]])
    })
}

/// Produces the cleaned binary mask of pixels matching the target.
#[derive(Debug, Clone)]
pub struct Segmenter {
    target: TargetColor,
    band: HueBand,
    element: StructuringElement,
}

impl Segmenter {
    pub fn new(target: TargetColor, band: HueBand) -> Self {
        Self {
            target,
            band,
            element: StructuringElement::ellipse(CLEANUP_KERNEL_SIZE, CLEANUP_KERNEL_SIZE),
        }
    }

    pub fn band(&self) -> &HueBand {
        &self.band
    }

    /// The thresholded mask before any morphology.
    pub fn raw_mask(&self, hsv: &HsvImage) -> GrayImage {
        let [first, second] = self.band.ranges();
        let mask_a = threshold(hsv, first, &self.target);
        let mask_b = threshold(hsv, second, &self.target);
        union(&mask_a, &mask_b)
    }

    /// Erode, dilate, dilate, erode.
    pub fn clean(&self, mask: &GrayImage) -> GrayImage {
        let opened = morphology::dilate(&morphology::erode(mask, &self.element), &self.element);
        morphology::erode(&morphology::dilate(&opened, &self.element), &self.element)
    }

    pub fn segment(&self, hsv: &HsvImage) -> GrayImage {
        let raw = self.raw_mask(hsv);
        let cleaned = self.clean(&raw);
        trace!(
            "segmented {}x{}: {} raw pixels, {} after cleanup",
            hsv.width(),
            hsv.height(),
            morphology::count_set(&raw),
            morphology::count_set(&cleaned)
        );
        cleaned
    }
}
