// THEORY:
// A `Stage` is one step of the host's post-processing chain. The host hands it
// each frame in turn; the stage may look at the frame, annotate it in place, and
// report something back. The trait is deliberately small: a stage is configured
// once from its JSON section and is then called once per frame.
//
// `InRangeStage` is the color-band detector packaged as a stage. Per frame it:
// 1.  runs the `ColorDetector` on a read-only view of the frame,
// 2.  outlines the detection on the original frame if `draw_box` is set,
// 3.  renders the quarter-size debug mask if `debug_mask` is set,
// 4.  always tells the host to keep the frame and carry on.

use crate::config::InRangeParams;
use crate::core_modules::detector::ColorDetector;
use crate::core_modules::frame::FrameMut;
use crate::core_modules::overlay::draw_rectangle;
use crate::core_modules::smart_blob::Detection;
use crate::core_modules::utils::image_helper::image_helper::render_debug_mask;
use crate::error::StageError;
use image::GrayImage;
use log::debug;
use serde_json::Value;

/// What a stage reports for one frame.
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// `false` asks the host to drop the frame and stop the chain.
    pub continue_pipeline: bool,
    pub detection: Detection,
    /// Downscaled copy of the mask, when requested.
    pub debug_mask: Option<GrayImage>,
}

impl StageOutput {
    pub fn pass_through(detection: Detection) -> Self {
        Self {
            continue_pipeline: true,
            detection,
            debug_mask: None,
        }
    }
}

/// The capability interface every post-processing stage implements.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reads the stage's section of the pipeline configuration.
    fn configure(&mut self, params: &Value) -> Result<(), StageError>;

    /// Processes one frame. The mutable view is only valid for this call.
    fn process_frame(&self, frame: &mut FrameMut<'_>) -> StageOutput;
}

pub struct InRangeStage {
    params: InRangeParams,
    detector: ColorDetector,
}

impl InRangeStage {
    pub const NAME: &'static str = "inrange";

    pub fn new(params: InRangeParams) -> Self {
        let detector = ColorDetector::new(params.target(), params.yuv_matrix);
        Self { params, detector }
    }

    /// Factory used by the stage registry.
    pub fn create() -> Box<dyn Stage> {
        Box::new(Self::default())
    }

    pub fn params(&self) -> &InRangeParams {
        &self.params
    }

    pub fn detector(&self) -> &ColorDetector {
        &self.detector
    }
}

impl Default for InRangeStage {
    fn default() -> Self {
        Self::new(InRangeParams::default())
    }
}

impl Stage for InRangeStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn configure(&mut self, params: &Value) -> Result<(), StageError> {
        let params = InRangeParams::from_value(params).map_err(|source| StageError::InvalidParameters {
            stage: Self::NAME,
            source,
        })?;
        *self = Self::new(params);
        Ok(())
    }

    fn process_frame(&self, frame: &mut FrameMut<'_>) -> StageOutput {
        let analysis = self.detector.analyze(&frame.as_frame());

        if self.params.draw_box {
            if let Some(bbox) = &analysis.detection {
                draw_rectangle(frame, bbox, self.params.box_color.to_rgb());
            }
        }

        let debug_mask = self.params.debug_mask.then(|| render_debug_mask(&analysis.mask));
        debug!("{}: {:?}", Self::NAME, analysis.detection);

        StageOutput {
            debug_mask,
            ..StageOutput::pass_through(analysis.detection)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::OwnedFrame;
    use crate::core_modules::smart_blob::BoundingBox;
    use image::{Rgb, RgbImage};
    use serde_json::json;

    fn red_square_frame() -> OwnedFrame {
        let mut rgb = RgbImage::from_pixel(64, 48, Rgb([128, 128, 128]));
        for y in 10..30 {
            for x in 12..40 {
                rgb.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        OwnedFrame::from_rgb(&rgb, 64).unwrap()
    }

    #[test]
    fn configure_replaces_target() {
        let mut stage = InRangeStage::default();
        stage.configure(&json!({ "color": { "r": 0, "g": 255, "b": 0 } })).unwrap();
        assert_eq!(stage.detector().target().green, 255);
        assert_eq!(stage.detector().band().primary.lo, 50);
    }

    #[test]
    fn bad_parameters_name_the_stage() {
        let mut stage = InRangeStage::default();
        let err = stage.configure(&json!({ "low_value": [1] })).unwrap_err();
        assert!(matches!(err, StageError::InvalidParameters { stage: "inrange", .. }));
    }

    #[test]
    fn detection_is_drawn_onto_the_frame() {
        let stage = InRangeStage::default();
        let mut frame = red_square_frame();
        let before = frame.data.clone();

        let output = stage.process_frame(&mut frame.as_frame_mut());
        assert!(output.continue_pipeline);
        assert_eq!(output.detection, Some(BoundingBox::new(12, 10, 28, 20)));
        assert!(output.debug_mask.is_none());
        assert_ne!(frame.data, before);
    }

    #[test]
    fn draw_box_off_leaves_frame_untouched() {
        let mut stage = InRangeStage::default();
        stage.configure(&json!({ "draw_box": false, "debug_mask": true })).unwrap();
        let mut frame = red_square_frame();
        let before = frame.data.clone();

        let output = stage.process_frame(&mut frame.as_frame_mut());
        assert_eq!(frame.data, before);
        assert_eq!(output.debug_mask.map(|m| m.dimensions()), Some((16, 12)));
    }

    #[test]
    fn empty_frame_still_continues() {
        let stage = InRangeStage::default();
        let mut frame = OwnedFrame::from_rgb(&RgbImage::new(16, 16), 16).unwrap();
        let output = stage.process_frame(&mut frame.as_frame_mut());
        assert!(output.continue_pipeline);
        assert_eq!(output.detection, None);
    }
}
