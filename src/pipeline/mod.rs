mod detection;
pub use detection::Detection;
pub use detection::Detections;

mod labels;
pub use labels::LabelTable;

pub mod postprocess;
pub use postprocess::PostProcessParams;
pub use postprocess::RawTensor;

pub(crate) mod preprocess;
pub use preprocess::prepare_input;
pub use preprocess::PreparedImage;

mod engine;
pub use engine::InferenceEngine;

pub(crate) mod detector;
pub use detector::YoloDetector;

#[cfg(feature = "tflite")]
mod tflite;
#[cfg(feature = "tflite")]
pub use self::tflite::TFLiteEngine;

mod summarize;
pub use summarize::log_detections;
pub use summarize::summarize_detections;
pub use summarize::DetectionSummary;
