use crate::core_modules::frame::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("no post-processing stage named \"{0}\" is registered")]
    UnknownStage(String),

    #[error("invalid parameters for stage \"{stage}\": {source}")]
    InvalidParameters {
        stage: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("pipeline configuration must be a JSON object of stage name -> parameters")]
    NotAnObject,

    #[error("failed to parse pipeline configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read pipeline configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("worker pool: {0}")]
    WorkerPool(&'static str),
}
