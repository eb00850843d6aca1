use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LOAD_MODEL: &str = "loadModel";
pub const DETECT_OBJECTS: &str = "detectObjects";

pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
pub const DETECTION_FAILED: &str = "DETECTION_FAILED";

/// A named call with JSON arguments, as sent by the UI side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "camelCase")]
pub enum MethodResult {
    Success(Value),
    Error { code: String, message: String },
    NotImplemented,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetectArguments {
    pub image: Option<Vec<u8>>,
}

impl MethodCall {
    pub fn new(method: &str, arguments: Value) -> Self {
        Self {
            method: method.to_string(),
            arguments,
        }
    }

    /// `None` when the image is absent or not a byte array.
    pub(crate) fn image_bytes(&self) -> Option<Vec<u8>> {
        DetectArguments::deserialize(&self.arguments)
            .ok()
            .and_then(|args| args.image)
    }
}

impl MethodResult {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        MethodResult::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
