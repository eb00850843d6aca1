use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use config::{Config, ConfigError};

use crate::pipeline::PostProcessParams;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub postprocess: PostProcessConfig,
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_filename: PathBuf,
    pub label_filename: PathBuf,
    pub num_threads: u8,
    pub input_size: u32,
    /// Used when the label file cannot be read.
    pub fallback_labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostProcessConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub box_shrink: f32,
}

/// Confidence bounds used when logging detections. Detections above
/// `high_threshold` or below `low_threshold` are reported separately.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub high_threshold: f32,
    pub low_threshold: f32,
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "model {}, labels {}, {}x{} input, {} threads",
            self.model_filename.display(),
            self.label_filename.display(),
            self.input_size,
            self.input_size,
            self.num_threads
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            postprocess: PostProcessConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_filename: PathBuf::from("models/yolo11s_float32.tflite"),
            label_filename: PathBuf::from("models/labels.txt"),
            num_threads: 4,
            input_size: 640,
            fallback_labels: Vec::new(),
        }
    }
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.50,
            iou_threshold: 0.45,
            box_shrink: 0.85,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.70,
            low_threshold: 0.40,
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::from(path))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Defaults overridden by environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("yolo")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    pub fn postprocess_params(&self) -> PostProcessParams {
        PostProcessParams {
            input_size: self.model.input_size,
            confidence_threshold: self.postprocess.confidence_threshold,
            iou_threshold: self.postprocess.iou_threshold,
            box_shrink: self.postprocess.box_shrink,
        }
    }
}
