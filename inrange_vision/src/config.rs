// THEORY:
// Configuration arrives as a JSON document in the host pipeline's format: one
// top-level key per stage, in execution order, each mapping to that stage's
// parameters:
//
//     { "inrange": { "color": { "r": 255, "g": 0, "b": 0 },
//                    "low_saturation": 50, "low_value": 50 } }
//
// Every parameter has a default, so a stage configured with `{}` is valid.
// Integers are read wide and are not range-checked: whatever the user wrote is
// what the detector uses.

use crate::core_modules::color_model::TargetColor;
use crate::core_modules::frame::YuvMatrix;
use crate::error::StageError;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// An RGB color as written in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ColorParams {
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self { r: 255, g: 0, b: 0 }
    }
}

impl ColorParams {
    /// Packs the channels into bytes the way an 8-bit pixel stores them:
    /// anything outside 0..=255 saturates.
    pub fn to_rgb(self) -> [u8; 3] {
        [saturate(self.r), saturate(self.g), saturate(self.b)]
    }
}

fn saturate(channel: i32) -> u8 {
    channel.clamp(0, 255) as u8
}

fn default_box_color() -> ColorParams {
    ColorParams { r: 0, g: 0, b: 255 }
}

/// Parameters of the `inrange` stage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InRangeParams {
    /// The color to look for.
    pub color: ColorParams,
    pub low_saturation: i32,
    pub low_value: i32,
    /// Outline the detection on the frame.
    pub draw_box: bool,
    #[serde(default = "default_box_color")]
    pub box_color: ColorParams,
    /// Produce a quarter-size copy of the mask with every frame.
    pub debug_mask: bool,
    /// Color space of the incoming stream.
    pub yuv_matrix: YuvMatrix,
}

impl Default for InRangeParams {
    fn default() -> Self {
        Self {
            color: ColorParams::default(),
            low_saturation: 50,
            low_value: 50,
            draw_box: true,
            box_color: default_box_color(),
            debug_mask: false,
            yuv_matrix: YuvMatrix::default(),
        }
    }
}

impl InRangeParams {
    pub fn from_value(params: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(params)
    }

    /// The detection target. Out-of-range values are passed through, with a warning.
    pub fn target(&self) -> TargetColor {
        let channels = [self.color.r, self.color.g, self.color.b];
        if channels.iter().any(|c| !(0..=255).contains(c)) {
            warn!("color {:?} is outside 0..=255 and will saturate", channels);
        }
        for (name, bound) in [("low_saturation", self.low_saturation), ("low_value", self.low_value)] {
            if !(0..=255).contains(&bound) {
                warn!("{} = {} is outside 0..=255 and is used as-is", name, bound);
            }
        }

        let [red, green, blue] = self.color.to_rgb();
        TargetColor {
            red,
            green,
            blue,
            low_saturation: self.low_saturation,
            low_value: self.low_value,
        }
    }
}

/// Parses a pipeline document into its ordered stage sections.
pub fn parse_pipeline_config(text: &str) -> Result<Map<String, Value>, StageError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(stages) => Ok(stages),
        _ => Err(StageError::NotAnObject),
    }
}

pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<Map<String, Value>, StageError> {
    let contents = fs::read_to_string(path)?;
    parse_pipeline_config(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_section_takes_defaults() {
        let params = InRangeParams::from_value(&json!({})).unwrap();
        assert_eq!(params, InRangeParams::default());
        assert_eq!(params.target(), TargetColor::default());
        assert_eq!(params.box_color, ColorParams { r: 0, g: 0, b: 255 });
    }

    #[test]
    fn partial_color_keeps_other_channel_defaults() {
        let params = InRangeParams::from_value(&json!({ "color": { "g": 200 }, "low_value": 80 })).unwrap();
        assert_eq!(params.color, ColorParams { r: 255, g: 200, b: 0 });
        assert_eq!(params.low_value, 80);
        assert_eq!(params.low_saturation, 50);
    }

    #[test]
    fn out_of_range_values_are_not_rejected() {
        let params = InRangeParams::from_value(&json!({
            "color": { "r": 300, "g": -20, "b": 0 },
            "low_saturation": -5,
            "low_value": 400
        }))
        .unwrap();
        let target = params.target();
        assert_eq!((target.red, target.green, target.blue), (255, 0, 0));
        assert_eq!(target.low_saturation, -5);
        assert_eq!(target.low_value, 400);
    }

    #[test]
    fn yuv_matrix_by_name() {
        let params = InRangeParams::from_value(&json!({ "yuv_matrix": "rec709" })).unwrap();
        assert_eq!(params.yuv_matrix, YuvMatrix::Rec709);
        assert!(InRangeParams::from_value(&json!({ "yuv_matrix": "bt2020" })).is_err());
    }

    #[test]
    fn wrong_type_is_an_error() {
        assert!(InRangeParams::from_value(&json!({ "low_value": "high" })).is_err());
    }

    #[test]
    fn pipeline_sections_keep_file_order() {
        let stages = parse_pipeline_config(r#"{ "zeta": {}, "inrange": { "low_value": 10 }, "alpha": {} }"#).unwrap();
        let names: Vec<&str> = stages.keys().map(String::as_str).collect();
        assert_eq!(names, ["zeta", "inrange", "alpha"]);
    }

    #[test]
    fn top_level_must_be_an_object() {
        assert!(matches!(parse_pipeline_config("[1, 2]"), Err(StageError::NotAnObject)));
        assert!(matches!(parse_pipeline_config("{ nope"), Err(StageError::Config(_))));
    }
}
