pub mod blob_detector;
pub mod color_model;
pub mod detector;
pub mod frame;
pub mod morphology;
pub mod overlay;
pub mod segmenter;
pub mod smart_blob;
pub mod utils;
