// THEORY:
// This file is the entry point for the `inrange_vision` library crate. It exposes
// a color-band object detector for planar 4:2:0 video frames, packaged as a
// post-processing stage for a host pipeline that hands frames to a chain of stages.
//
// The public surface is layered:
// - `pipeline::PostProcessingPipeline` builds a chain of stages from a JSON
//   document and runs frames through it synchronously.
// - `parallel_pipeline::ParallelDetector` runs the same detector on a pool of
//   tokio workers for hosts that batch frames.
// - `stage`, `registry` and `config` define the stage contract, the name ->
//   constructor map, and the parameter format.
// The image processing itself (color model, segmentation, morphology, labeling)
// lives in `core_modules` and has no knowledge of stages or configuration files.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod registry;
pub mod stage;

pub use core_modules::color_model::TargetColor;
pub use core_modules::detector::{ColorDetector, FrameAnalysis};
pub use core_modules::frame::{Frame, FrameError, FrameGeometry, FrameMut, OwnedFrame, YuvMatrix};
pub use core_modules::smart_blob::{BoundingBox, Detection};
pub use error::StageError;
