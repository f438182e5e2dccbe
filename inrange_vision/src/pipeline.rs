// THEORY:
// The `pipeline` module is the top-level API for hosts that process frames one at
// a time. It turns a pipeline document into a list of configured stages and runs
// every frame through them in order.
//
// Key architectural principles:
// 1.  **Explicit Wiring**: Stages come from a `StageRegistry` handed in by the
//     caller, in the order they appear in the document.
// 2.  **Synchronous**: `process_frame` runs on the caller's thread and returns when
//     every stage is done. The frame is borrowed mutably for exactly that long.
// 3.  **Never Halts on Its Own**: A stage can ask to stop the chain, but the
//     built-in stages never do. An empty pipeline passes frames through untouched.

use crate::config::{load_pipeline_config, parse_pipeline_config};
use crate::core_modules::frame::FrameMut;
use crate::error::StageError;
use crate::registry::StageRegistry;
use crate::stage::{Stage, StageOutput};
use log::{debug, info};
use serde_json::{Map, Value};
use std::path::Path;

// Re-export key data structures for the public API.
pub use crate::core_modules::smart_blob::{BoundingBox, Detection};

/// The result of running one frame through the pipeline.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// `false` when a stage asked for the frame to be dropped.
    pub continue_pipeline: bool,
    /// Output of each stage that ran, in order.
    pub stage_outputs: Vec<(&'static str, StageOutput)>,
}

impl FrameReport {
    /// The first detection any stage reported.
    pub fn detection(&self) -> Detection {
        self.stage_outputs.iter().find_map(|(_, output)| output.detection)
    }

    pub fn output_of(&self, stage: &str) -> Option<&StageOutput> {
        self.stage_outputs
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, output)| output)
    }
}

/// The main, top-level struct for hosts that feed frames synchronously.
pub struct PostProcessingPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl PostProcessingPipeline {
    /// Builds and configures one stage per section of the document.
    pub fn from_config(registry: &StageRegistry, sections: &Map<String, Value>) -> Result<Self, StageError> {
        let mut stages = Vec::with_capacity(sections.len());
        for (name, params) in sections {
            let mut stage = registry.create(name)?;
            stage.configure(params)?;
            info!("configured stage \"{}\"", stage.name());
            stages.push(stage);
        }
        Ok(Self { stages })
    }

    pub fn from_json(registry: &StageRegistry, text: &str) -> Result<Self, StageError> {
        Self::from_config(registry, &parse_pipeline_config(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(registry: &StageRegistry, path: P) -> Result<Self, StageError> {
        Self::from_config(registry, &load_pipeline_config(path)?)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn process_frame(&self, frame: &mut FrameMut<'_>) -> FrameReport {
        let mut stage_outputs = Vec::with_capacity(self.stages.len());
        let mut continue_pipeline = true;

        for stage in &self.stages {
            let output = stage.process_frame(frame);
            continue_pipeline = output.continue_pipeline;
            stage_outputs.push((stage.name(), output));
            if !continue_pipeline {
                debug!("stage \"{}\" dropped the frame", stage.name());
                break;
            }
        }

        FrameReport {
            continue_pipeline,
            stage_outputs,
        }
    }
}
