// THEORY:
// The `ColorDetector` chains the core layers into the per-frame contract:
// raw frame -> RGB -> HSV -> cleaned mask -> largest blob -> `Detection`.
//
// Key architectural principles:
// 1.  **Configured Once**: The target color, its hue band and the structuring
//     element are fixed at construction. Per-frame work only reads them, so a single
//     detector can be shared behind an `Arc` by any number of workers.
// 2.  **Fresh Buffers**: Every call allocates its own RGB, HSV, mask and label
//     buffers. Nothing survives the call, and two calls on the same input give the
//     same answer.
// 3.  **Read-Only Input**: The detector only ever sees a `Frame`, never a
//     `FrameMut`. Drawing the result is the stage's job.

use crate::core_modules::blob_detector::blob_detector;
use crate::core_modules::color_model::{HueBand, TargetColor};
use crate::core_modules::frame::{Frame, HsvImage, YuvMatrix};
use crate::core_modules::segmenter::Segmenter;
use crate::core_modules::smart_blob::Detection;
use image::GrayImage;
use log::{debug, info};

/// Everything the detector learned about one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub detection: Detection,
    /// The cleaned mask the detection was taken from, at full resolution.
    pub mask: GrayImage,
    /// Number of connected regions found in the mask.
    pub component_count: usize,
}

#[derive(Debug, Clone)]
pub struct ColorDetector {
    target: TargetColor,
    matrix: YuvMatrix,
    segmenter: Segmenter,
}

impl ColorDetector {
    pub fn new(target: TargetColor, matrix: YuvMatrix) -> Self {
        let band = target.hue_band();
        info!(
            "target rgb({}, {}, {}) -> hue {}, band {:?}, s >= {}, v >= {}",
            target.red,
            target.green,
            target.blue,
            target.hue(),
            band,
            target.low_saturation,
            target.low_value
        );
        Self {
            target,
            matrix,
            segmenter: Segmenter::new(target, band),
        }
    }

    pub fn target(&self) -> &TargetColor {
        &self.target
    }

    pub fn band(&self) -> &HueBand {
        self.segmenter.band()
    }

    pub fn matrix(&self) -> YuvMatrix {
        self.matrix
    }

    /// Runs the full chain on a raw frame.
    pub fn analyze(&self, frame: &Frame<'_>) -> FrameAnalysis {
        let rgb = frame.to_rgb(self.matrix);
        let hsv = HsvImage::from_rgb(&rgb);
        self.analyze_hsv(&hsv)
    }

    /// Runs segmentation and blob selection on an already converted image.
    pub fn analyze_hsv(&self, hsv: &HsvImage) -> FrameAnalysis {
        let mask = self.segmenter.segment(hsv);
        let labeling = blob_detector::label_components(&mask);
        let detection = blob_detector::select_largest(&labeling.components).map(|c| c.bounding_box);

        debug!(
            "{} component(s), detection {:?}",
            labeling.components.len(),
            detection
        );

        FrameAnalysis {
            detection,
            mask,
            component_count: labeling.components.len(),
        }
    }

    pub fn detect(&self, frame: &Frame<'_>) -> Detection {
        self.analyze(frame).detection
    }
}

impl Default for ColorDetector {
    fn default() -> Self {
        Self::new(TargetColor::default(), YuvMatrix::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::OwnedFrame;
    use crate::core_modules::smart_blob::BoundingBox;
    use image::{Rgb, RgbImage};

    fn scene(width: u32, height: u32, rects: &[(u32, u32, u32, u32, [u8; 3])]) -> OwnedFrame {
        let mut rgb = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
        for &(left, top, w, h, color) in rects {
            for y in top..top + h {
                for x in left..left + w {
                    rgb.put_pixel(x, y, Rgb(color));
                }
            }
        }
        OwnedFrame::from_rgb(&rgb, width).unwrap()
    }

    #[test]
    fn finds_a_blue_square() {
        let target = TargetColor { red: 0, green: 0, blue: 255, ..TargetColor::default() };
        let detector = ColorDetector::new(target, YuvMatrix::Jpeg);
        let frame = scene(64, 48, &[(10, 8, 20, 16, [0, 0, 255]), (40, 30, 12, 12, [255, 0, 0])]);
        assert_eq!(detector.detect(&frame.as_frame()), Some(BoundingBox::new(10, 8, 20, 16)));
    }

    #[test]
    fn grey_scene_detects_nothing() {
        let detector = ColorDetector::default();
        let analysis = detector.analyze(&scene(32, 32, &[]).as_frame());
        assert_eq!(analysis.detection, None);
        assert_eq!(analysis.component_count, 0);
        assert_eq!(analysis.mask.dimensions(), (32, 32));
    }

    #[test]
    fn dim_target_is_rejected_by_value_bound() {
        let detector = ColorDetector::default();
        // Dark red: value ~40, below the default bound of 50.
        let frame = scene(48, 48, &[(8, 8, 20, 20, [40, 0, 0])]);
        assert_eq!(detector.detect(&frame.as_frame()), None);
    }
}
